//! Gateway: the event loop connecting the webhook queue, memory, and the provider.

mod pipeline;


use linerelay_core::{
    message::{IncomingMessage, OutgoingMessage},
    traits::{Channel, Provider},
};
use linerelay_memory::{HistoryStore, PromptStore, SessionTracker};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Capacity of the queue between the webhook handler and the gateway.
pub const QUEUE_CAPACITY: usize = 256;

/// The central gateway that routes messages between the channel and the provider.
pub struct Gateway {
    pub(super) provider: Arc<dyn Provider>,
    pub(super) channel: Arc<dyn Channel>,
    pub(super) history: HistoryStore,
    pub(super) prompts: PromptStore,
    pub(super) sessions: SessionTracker,
    /// Language of fixed replies.
    pub(super) language: String,
    /// Senders with a message in flight. Their later messages wait here.
    pub(super) active_senders: Mutex<HashMap<String, Vec<IncomingMessage>>>,
}

impl Gateway {
    /// Create a new gateway.
    pub fn new(
        provider: Arc<dyn Provider>,
        channel: Arc<dyn Channel>,
        history: HistoryStore,
        prompts: PromptStore,
        sessions: SessionTracker,
        language: String,
    ) -> Self {
        Self {
            provider,
            channel,
            history,
            prompts,
            sessions,
            language,
            active_senders: Mutex::new(HashMap::new()),
        }
    }

    /// Run the main event loop until every sender of `rx` is dropped.
    ///
    /// Different users are served concurrently. Messages from one user are
    /// handled one at a time, in arrival order. In-flight messages are
    /// drained before returning.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<IncomingMessage>) {
        info!(
            "Gateway running | provider: {} | channel: {}",
            self.provider.name(),
            self.channel.name()
        );

        let mut tasks = JoinSet::new();
        while let Some(incoming) = rx.recv().await {
            let sender_key = format!("{}:{}", incoming.channel, incoming.sender_id);
            {
                let mut active = self.active_senders.lock().await;
                if let Some(buffer) = active.get_mut(&sender_key) {
                    debug!("buffered message from {sender_key} (earlier message in flight)");
                    buffer.push(incoming);
                    continue;
                }
                active.insert(sender_key.clone(), Vec::new());
            }
            let gw = self.clone();
            tasks.spawn(async move { gw.serve_sender(sender_key, incoming).await });
            while let Some(done) = tasks.try_join_next() {
                if let Err(e) = done {
                    error!("message task failed: {e}");
                }
            }
        }

        info!("Queue closed, waiting for {} in-flight message(s)", tasks.len());
        while let Some(done) = tasks.join_next().await {
            if let Err(e) = done {
                error!("message task failed: {e}");
            }
        }
        info!("Gateway stopped");
    }

    /// Handle `first`, then every message buffered for the same sender
    /// meanwhile. The sender stays marked active until its buffer is empty.
    async fn serve_sender(&self, sender_key: String, first: IncomingMessage) {
        self.handle_message(first).await;

        loop {
            let next = {
                let mut active = self.active_senders.lock().await;
                match active.get_mut(&sender_key) {
                    Some(buffer) if !buffer.is_empty() => Some(buffer.remove(0)),
                    _ => {
                        active.remove(&sender_key);
                        None
                    }
                }
            };

            match next {
                Some(buffered) => {
                    debug!("processing buffered message from {sender_key}");
                    self.handle_message(buffered).await;
                }
                None => break,
            }
        }
    }

    /// Send a plain text reply to the sender of `incoming`. Delivery errors
    /// are logged, never retried.
    pub(super) async fn send_text(&self, incoming: &IncomingMessage, text: &str) {
        self.deliver(OutgoingMessage::reply_to(incoming, text)).await;
    }

    pub(super) async fn deliver(&self, msg: OutgoingMessage) {
        if let Err(e) = self.channel.send(msg).await {
            error!("failed to send message via {}: {e}", self.channel.name());
        }
    }
}
