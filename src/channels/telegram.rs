//! Telegram channel — long-polls the Bot API for updates.
//!
//! Consumes text messages and inline-button presses, and renders dialogue
//! controls as reply keyboards (cancel, grade choice) or inline buttons
//! (confirm / cancel).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::channels::{Channel, IncomingMessage, MessageStream};
use crate::dialogue::event::{CANCEL_DATA, CONFIRM_DATA};
use crate::dialogue::{Controls, Outbound, Reply, prompts};
use crate::error::ChannelError;
use crate::students::UserId;

/// Buttons per row on the grade keyboard.
const GRADE_BUTTONS_PER_ROW: usize = 4;

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    poll_timeout_secs: u64,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, poll_timeout_secs: u64) -> Self {
        Self {
            bot_token,
            poll_timeout_secs,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.bot_token, method)
    }

    /// Call a Bot API method, treating any non-2xx status as a failure.
    async fn call(&self, method: &str, body: &Value) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            return Ok(());
        }
        let status = resp.status();
        let err = resp.text().await.unwrap_or_default();
        Err(ChannelError::SendFailed {
            name: "telegram".into(),
            reason: format!("{method} returned {status}: {err}"),
        })
    }

    /// Send a reply, trying Markdown first with plain text fallback.
    async fn send_message(&self, chat_id: &str, reply: &Reply) -> Result<(), ChannelError> {
        let markdown_body = message_body(chat_id, reply, Some("Markdown"));
        let markdown_err = match self.call("sendMessage", &markdown_body).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        // User-supplied names can contain stray `*` or `_`.
        tracing::warn!(
            error = %markdown_err,
            "Telegram sendMessage with Markdown failed; retrying without parse_mode"
        );

        let plain_body = message_body(chat_id, reply, None);
        self.call("sendMessage", &plain_body).await
    }

    /// Strip the inline buttons from a previously sent message.
    async fn clear_inline_keyboard(&self, chat_id: &str, message_id: i64) -> Result<(), ChannelError> {
        self.call(
            "editMessageReplyMarkup",
            &json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "reply_markup": { "inline_keyboard": [] },
            }),
        )
        .await
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let poll_timeout = self.poll_timeout_secs;
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = json!({
                    "offset": offset,
                    "timeout": poll_timeout,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                if data.get("ok").and_then(Value::as_bool) == Some(false) {
                    let description = data
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    tracing::warn!(description, "Telegram getUpdates rejected");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }

                let Some(results) = data.get("result").and_then(Value::as_array) else {
                    continue;
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(incoming) = parse_update(update) else {
                        continue;
                    };

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(&self, msg: &IncomingMessage, response: Outbound) -> Result<(), ChannelError> {
        let chat_id = msg
            .metadata
            .get("chat_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: "No chat_id in message metadata".into(),
            })?;

        match response {
            Outbound::Reply(reply) => self.send_message(chat_id, &reply).await,
            Outbound::ClearControls => {
                // Only control presses know which message carried the buttons.
                match msg.metadata.get("message_id").and_then(Value::as_i64) {
                    Some(message_id) => self.clear_inline_keyboard(chat_id, message_id).await,
                    None => Ok(()),
                }
            }
        }
    }

    async fn acknowledge(&self, msg: &IncomingMessage) -> Result<(), ChannelError> {
        let Some(query_id) = msg.metadata.get("callback_query_id").and_then(Value::as_str) else {
            return Ok(());
        };
        self.call("answerCallbackQuery", &json!({ "callback_query_id": query_id }))
            .await
    }

    async fn register_commands(&self, commands: &[(&str, &str)]) -> Result<(), ChannelError> {
        let commands: Vec<Value> = commands
            .iter()
            .map(|(command, description)| json!({ "command": command, "description": description }))
            .collect();
        self.call("setMyCommands", &json!({ "commands": commands }))
            .await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn api_url(token: &SecretString, method: &str) -> String {
    format!("https://api.telegram.org/bot{}/{method}", token.expose_secret())
}

/// Turn one `getUpdates` entry into an `IncomingMessage`.
///
/// Text messages keep `chat_id`; button presses additionally carry the
/// `message_id` holding the buttons and the `callback_query_id` to answer.
/// Anything else (stickers, photos, edits) is skipped.
fn parse_update(update: &Value) -> Option<IncomingMessage> {
    if let Some(message) = update.get("message") {
        let text = message.get("text").and_then(Value::as_str)?;
        let from = message.get("from")?;
        let user_id = from.get("id").and_then(Value::as_i64)?;
        let chat_id = message.get("chat")?.get("id").and_then(Value::as_i64)?;

        let mut incoming = IncomingMessage::text("telegram", UserId(user_id), text)
            .with_metadata(json!({ "chat_id": chat_id.to_string() }));
        if let Some(name) = display_name(from) {
            incoming = incoming.with_user_name(name);
        }
        return Some(incoming);
    }

    if let Some(query) = update.get("callback_query") {
        let query_id = query.get("id").and_then(Value::as_str)?;
        let from = query.get("from")?;
        let user_id = from.get("id").and_then(Value::as_i64)?;
        let data = query.get("data").and_then(Value::as_str)?;
        // The message may be missing for very old or inaccessible messages;
        // replies then go to the user's private chat.
        let message = query.get("message");
        let chat_id = message
            .and_then(|m| m.get("chat"))
            .and_then(|c| c.get("id"))
            .and_then(Value::as_i64)
            .unwrap_or(user_id);
        let message_id = message
            .and_then(|m| m.get("message_id"))
            .and_then(Value::as_i64);

        let mut incoming = IncomingMessage::control("telegram", UserId(user_id), data)
            .with_metadata(json!({
                "chat_id": chat_id.to_string(),
                "message_id": message_id,
                "callback_query_id": query_id,
            }));
        if let Some(name) = display_name(from) {
            incoming = incoming.with_user_name(name);
        }
        return Some(incoming);
    }

    None
}

fn display_name(from: &Value) -> Option<&str> {
    from.get("first_name")
        .and_then(Value::as_str)
        .or_else(|| from.get("username").and_then(Value::as_str))
}

fn keyboard_button(label: &str) -> Value {
    json!({ "text": label })
}

/// `sendMessage` body for a reply. Replies that keep the current controls
/// carry no `reply_markup`.
fn message_body(chat_id: &str, reply: &Reply, parse_mode: Option<&str>) -> Value {
    let mut body = json!({
        "chat_id": chat_id,
        "text": reply.text,
    });
    if let Some(mode) = parse_mode {
        body["parse_mode"] = json!(mode);
    }
    if let Some(markup) = reply_markup(reply.controls) {
        body["reply_markup"] = markup;
    }
    body
}

/// Telegram `reply_markup` for a set of dialogue controls.
fn reply_markup(controls: Controls) -> Option<Value> {
    let markup = match controls {
        Controls::Keep => return None,
        Controls::None => json!({ "remove_keyboard": true }),
        Controls::CancelOnly => json!({
            "keyboard": [[keyboard_button(prompts::CANCEL_LABEL)]],
            "resize_keyboard": true,
        }),
        Controls::GradeChoice => {
            let buttons: Vec<Value> = Controls::grade_labels()
                .map(|label| keyboard_button(&label))
                .chain(std::iter::once(keyboard_button(prompts::CANCEL_LABEL)))
                .collect();
            let rows: Vec<Value> = buttons
                .chunks(GRADE_BUTTONS_PER_ROW)
                .map(|row| Value::Array(row.to_vec()))
                .collect();
            json!({ "keyboard": rows, "resize_keyboard": true })
        }
        Controls::ConfirmCancel => json!({
            "inline_keyboard": [[
                { "text": prompts::CONFIRM_LABEL, "callback_data": CONFIRM_DATA },
                { "text": prompts::CANCEL_LABEL, "callback_data": CANCEL_DATA },
            ]]
        }),
    };
    Some(markup)
}

// ── Tests ───────────────────────────────────────────────────────────
