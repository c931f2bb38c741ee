//! Bot — wires a channel to the dialogue engine and runs the message loop.
//!
//! Each user gets a FIFO queue drained by its own worker task, so one
//! user's messages are handled strictly in arrival order while different
//! users proceed in parallel. A queue is dropped once its worker has
//! caught up, and recreated on the user's next message.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};

use crate::channels::{Channel, IncomingMessage};
use crate::dialogue::{DialogueEngine, prompts};
use crate::error;
use crate::students::UserId;

/// The running bot: one channel, one engine.
pub struct Bot {
    engine: Arc<DialogueEngine>,
    channel: Arc<dyn Channel>,
}

impl Bot {
    pub fn new(engine: Arc<DialogueEngine>, channel: Arc<dyn Channel>) -> Self {
        Self { engine, channel }
    }

    pub fn engine(&self) -> &Arc<DialogueEngine> {
        &self.engine
    }

    /// Run until Ctrl+C or until the channel's stream ends.
    pub async fn run(&self) -> error::Result<()> {
        self.channel.health_check().await?;

        if let Err(e) = self.channel.register_commands(prompts::COMMANDS).await {
            tracing::warn!(channel = self.channel.name(), error = %e, "Failed to register command menu");
        }

        let mut message_stream = self.channel.start().await?;
        let mut dispatcher = Dispatcher::new(Arc::clone(&self.engine), Arc::clone(&self.channel));

        tracing::info!(channel = self.channel.name(), "Bot ready and listening");

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("Channel stream ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            dispatcher.submit(message);
        }

        // Let queued messages finish and their replies go out.
        dispatcher.finish().await;

        tracing::info!("Bot shutting down...");
        self.channel.shutdown().await?;
        Ok(())
    }
}

/// One user's pending messages.
struct UserQueue {
    tx: mpsc::UnboundedSender<IncomingMessage>,
    /// Messages sent to the worker and not yet fully handled.
    pending: Arc<AtomicUsize>,
}

/// Routes each message to its user's queue.
///
/// Only `submit` increments `pending`, so a queue observed at zero here
/// has nothing in flight and can be dropped without losing or reordering
/// messages.
struct Dispatcher {
    engine: Arc<DialogueEngine>,
    channel: Arc<dyn Channel>,
    queues: HashMap<UserId, UserQueue>,
    workers: JoinSet<()>,
}

impl Dispatcher {
    fn new(engine: Arc<DialogueEngine>, channel: Arc<dyn Channel>) -> Self {
        Self {
            engine,
            channel,
            queues: HashMap::new(),
            workers: JoinSet::new(),
        }
    }

    /// Queue `message` behind any earlier messages from the same user.
    fn submit(&mut self, message: IncomingMessage) {
        self.reap();

        let user_id = message.user_id;
        let message = match self.queues.get(&user_id) {
            Some(queue) => {
                queue.pending.fetch_add(1, Ordering::AcqRel);
                match queue.tx.send(message) {
                    Ok(()) => return,
                    // The worker is gone (its handler panicked); start over.
                    Err(mpsc::error::SendError(message)) => message,
                }
            }
            None => message,
        };

        let queue = self.spawn_worker();
        queue.pending.fetch_add(1, Ordering::AcqRel);
        if queue.tx.send(message).is_err() {
            tracing::error!(user_id = %user_id, "New message worker closed before first message");
        }
        self.queues.insert(user_id, queue);
    }

    fn spawn_worker(&mut self) -> UserQueue {
        let (tx, mut rx) = mpsc::unbounded_channel::<IncomingMessage>();
        let pending = Arc::new(AtomicUsize::new(0));

        let engine = Arc::clone(&self.engine);
        let channel = Arc::clone(&self.channel);
        let worker_pending = Arc::clone(&pending);
        self.workers.spawn(async move {
            while let Some(message) = rx.recv().await {
                dispatch(&engine, channel.as_ref(), message).await;
                worker_pending.fetch_sub(1, Ordering::AcqRel);
            }
        });

        UserQueue { tx, pending }
    }

    /// Drop queues whose worker has caught up and collect finished workers.
    fn reap(&mut self) {
        self.queues
            .retain(|_, queue| queue.pending.load(Ordering::Acquire) > 0);
        while let Some(done) = self.workers.try_join_next() {
            log_join_error(done);
        }
    }

    /// Users with a live queue.
    fn active_queues(&self) -> usize {
        self.queues.len()
    }

    /// Close every queue and wait for the workers to drain them.
    async fn finish(mut self) {
        self.queues.clear();
        while let Some(done) = self.workers.join_next().await {
            log_join_error(done);
        }
    }
}

/// Handle one incoming message and deliver everything it produced.
async fn dispatch(engine: &DialogueEngine, channel: &dyn Channel, message: IncomingMessage) {
    tracing::debug!(
        channel = %message.channel,
        user_id = %message.user_id,
        control = message.is_control(),
        "Received message"
    );

    let outbound = engine.handle_payload(message.user_id, &message.payload).await;

    if message.is_control() {
        if let Err(e) = channel.acknowledge(&message).await {
            tracing::warn!(user_id = %message.user_id, error = %e, "Failed to acknowledge control");
        }
    }

    for response in outbound {
        if let Err(e) = channel.respond(&message, response).await {
            tracing::error!(user_id = %message.user_id, error = %e, "Failed to deliver response");
        }
    }
}

fn log_join_error(result: Result<(), JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "Message worker task failed");
    }
}
