//! CLI channel — stdin/stdout REPL for local testing.
//!
//! Everything typed is text from a single local user. Buttons are pressed
//! by typing `!confirm` or `!cancel`.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, IncomingMessage, MessageStream};
use crate::dialogue::event::{CANCEL_DATA, CONFIRM_DATA};
use crate::dialogue::{Controls, Outbound, prompts};
use crate::error::ChannelError;
use crate::students::UserId;

/// Identity used for the local CLI user.
pub const CLI_USER: UserId = UserId(0);

/// Prefix that turns a typed line into a control press.
const CONTROL_PREFIX: char = '!';

/// A simple CLI channel that reads from stdin and writes to stdout.
#[derive(Default)]
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(msg) = parse_line(&line) else {
                            eprint!("> ");
                            continue;
                        };
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: Outbound,
    ) -> Result<(), ChannelError> {
        match response {
            Outbound::Reply(reply) => {
                println!("\n{}", reply.text);
                if let Some(hint) = render_controls(reply.controls) {
                    println!("{hint}");
                }
                println!();
                eprint!("> ");
            }
            // Hints are printed once per reply; nothing to take back.
            Outbound::ClearControls => {}
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

/// Turn one typed line into a message. Blank lines are skipped.
fn parse_line(line: &str) -> Option<IncomingMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let msg = match line.strip_prefix(CONTROL_PREFIX) {
        Some(data) if !data.is_empty() => IncomingMessage::control("cli", CLI_USER, data),
        _ => IncomingMessage::text("cli", CLI_USER, line),
    };
    Some(msg.with_user_name("local-user"))
}

/// One-line hint describing the controls, if any.
fn render_controls(controls: Controls) -> Option<String> {
    match controls {
        Controls::Keep | Controls::None => None,
        Controls::CancelOnly => Some(format!("[{}]", prompts::CANCEL_LABEL)),
        Controls::GradeChoice => {
            let mut labels: Vec<String> = Controls::grade_labels().collect();
            labels.push(prompts::CANCEL_LABEL.to_string());
            Some(format!("[{}]", labels.join(" | ")))
        }
        Controls::ConfirmCancel => Some(format!(
            "[{CONTROL_PREFIX}{CONFIRM_DATA}] {} / [{CONTROL_PREFIX}{CANCEL_DATA}] {}",
            prompts::CONFIRM_LABEL,
            prompts::CANCEL_LABEL
        )),
    }
}
