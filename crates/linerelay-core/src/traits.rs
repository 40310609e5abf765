use crate::{
    context::Context,
    error::RelayError,
    message::{Attachment, OutgoingMessage},
};
use async_trait::async_trait;

/// AI completion provider.
///
/// Every completion backend (OpenRouter, OpenAI-compatible, Gemini)
/// implements this trait to provide a uniform interface.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Send a conversation context to the provider and get a response.
    async fn complete(&self, context: &Context) -> Result<OutgoingMessage, RelayError>;

    /// Check if the provider is available and ready.
    async fn is_available(&self) -> bool;
}

/// Messaging channel, outbound side.
///
/// Inbound traffic arrives through the HTTP webhook, so a channel only
/// needs to deliver replies and fetch the content an event refers to.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Send a response back through this channel.
    async fn send(&self, message: OutgoingMessage) -> Result<(), RelayError>;

    /// Fetch the bytes of an inbound attachment.
    async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>, RelayError> {
        Err(RelayError::Attachment(format!(
            "{} cannot download attachment {}",
            self.name(),
            attachment.content_id
        )))
    }
}
