//! LINE Messaging API channel.
//!
//! Inbound events arrive on the webhook and are parsed by [`parse_events`].
//! Replies go out through the reply API when the event carried a reply
//! token, otherwise through the push API. Image bytes are fetched from the
//! content API by message id.
//! Docs: <https://developers.line.biz/en/reference/messaging-api/>

mod signature;
mod types;


pub use signature::{sign, verify_signature, SIGNATURE_HEADER};
pub use types::parse_events;

use async_trait::async_trait;
use linerelay_core::{
    config::LineConfig,
    error::RelayError,
    message::{Attachment, OutgoingMessage},
    traits::Channel,
};
use tracing::{debug, warn};

use crate::utils::split_message;
use types::{PushRequest, ReplyRequest, TextMessage};

/// Maximum message objects per reply or push call.
pub const MAX_MESSAGES_PER_CALL: usize = 5;

/// LINE channel using the reply and push endpoints.
pub struct LineChannel {
    config: LineConfig,
    client: reqwest::Client,
}

impl LineChannel {
    /// Create a new LINE channel from config.
    pub fn new(config: LineConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base_url.trim_end_matches('/'))
    }

    fn content_endpoint(&self, message_id: &str) -> String {
        format!(
            "{}/v2/bot/message/{message_id}/content",
            self.config.data_api_base_url.trim_end_matches('/')
        )
    }

    /// Split text into bubbles, capped at the per-call limit.
    fn bubbles(&self, text: &str) -> Vec<String> {
        let mut chunks = split_message(text, self.config.max_message_length);
        if chunks.len() > MAX_MESSAGES_PER_CALL {
            warn!(
                "line: reply split into {} chunks, dropping {}",
                chunks.len(),
                chunks.len() - MAX_MESSAGES_PER_CALL
            );
            chunks.truncate(MAX_MESSAGES_PER_CALL);
        }
        chunks
    }

    async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), RelayError> {
        let resp = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(&self.config.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| RelayError::Delivery(format!("line request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RelayError::Delivery(format!(
                "line {path} returned {status}: {text}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Channel for LineChannel {
    fn name(&self) -> &str {
        "line"
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), RelayError> {
        let chunks = self.bubbles(&message.text);
        let messages: Vec<TextMessage<'_>> = chunks
            .iter()
            .map(|c| TextMessage {
                message_type: "text",
                text: c,
            })
            .collect();

        if let Some(reply_token) = message.reply_token.as_deref() {
            debug!("line: reply with {} message(s)", messages.len());
            return self
                .post_json(
                    "/v2/bot/message/reply",
                    &ReplyRequest {
                        reply_token,
                        messages,
                    },
                )
                .await;
        }

        let to = message
            .reply_target
            .as_deref()
            .ok_or_else(|| RelayError::Delivery("no reply token or target".into()))?;
        debug!("line: push to {to} with {} message(s)", messages.len());
        self.post_json("/v2/bot/message/push", &PushRequest { to, messages })
            .await
    }

    async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>, RelayError> {
        let id = attachment.content_id.as_str();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RelayError::Attachment(format!("invalid message id: {id:?}")));
        }

        let resp = self
            .client
            .get(self.content_endpoint(id))
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(|e| RelayError::Attachment(format!("line content request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RelayError::Attachment(format!(
                "line content {id} returned {status}: {text}"
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RelayError::Attachment(format!("line content {id} read failed: {e}")))?;
        debug!("line: downloaded {} bytes for message {id}", bytes.len());
        Ok(bytes.to_vec())
    }
}
