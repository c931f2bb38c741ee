//! Channel trait and the message types exchanged with transports.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::dialogue::{Outbound, Payload};
use crate::error::ChannelError;
use crate::students::UserId;

/// Stream of inbound messages produced by a channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A message or control press received from a user.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Name of the channel that received it.
    pub channel: String,
    pub user_id: UserId,
    pub user_name: Option<String>,
    pub payload: Payload,
    /// Channel-specific routing data (chat id, message id, ...).
    pub metadata: serde_json::Value,
}

impl IncomingMessage {
    pub fn new(channel: &str, user_id: UserId, payload: Payload) -> Self {
        Self {
            channel: channel.to_string(),
            user_id,
            user_name: None,
            payload,
            metadata: serde_json::json!({}),
        }
    }

    pub fn text(channel: &str, user_id: UserId, text: &str) -> Self {
        Self::new(channel, user_id, Payload::Text(text.to_string()))
    }

    pub fn control(channel: &str, user_id: UserId, data: &str) -> Self {
        Self::new(channel, user_id, Payload::Control(data.to_string()))
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_user_name(mut self, name: &str) -> Self {
        self.user_name = Some(name.to_string());
        self
    }

    /// Whether this is a control press the transport expects an answer to.
    pub fn is_control(&self) -> bool {
        matches!(self.payload, Payload::Control(_))
    }
}

/// A transport the bot can talk through.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Start receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Render one outbound response in reply to `msg`.
    async fn respond(&self, msg: &IncomingMessage, response: Outbound)
    -> Result<(), ChannelError>;

    /// Answer a control press so the client stops waiting on it.
    async fn acknowledge(&self, _msg: &IncomingMessage) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Publish the command menu, for transports that have one.
    async fn register_commands(&self, _commands: &[(&str, &str)]) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError>;
}
