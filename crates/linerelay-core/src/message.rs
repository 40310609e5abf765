use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An incoming message from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: Uuid,
    /// Channel name (e.g. "line").
    pub channel: String,
    /// Platform-specific user ID.
    pub sender_id: String,
    /// Message text content, trimmed. Empty for image messages.
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Single-use token for replying to this event, when the platform issues one.
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl IncomingMessage {
    /// The first image attached to this message, if any.
    pub fn image(&self) -> Option<&Attachment> {
        self.attachments
            .iter()
            .find(|a| matches!(a.file_type, AttachmentType::Image))
    }
}

/// Media sent along with a message. The bytes stay on the platform until
/// a channel downloads them by `content_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub file_type: AttachmentType,
    /// Platform id used to fetch the content (the LINE message id).
    pub content_id: String,
}

/// Supported attachment types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentType {
    Image,
}

/// An outgoing message to send back through a channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    pub metadata: MessageMetadata,
    /// Platform-specific push target (e.g. LINE user id).
    #[serde(default)]
    pub reply_target: Option<String>,
    /// Reply token copied from the inbound event. Preferred over a push when set.
    #[serde(default)]
    pub reply_token: Option<String>,
}

/// Metadata about how a message was generated.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessageMetadata {
    /// Which provider produced this response.
    pub provider_used: String,
    /// Token count (if available from the provider).
    pub tokens_used: Option<u64>,
    /// Wall-clock processing time in milliseconds.
    pub processing_time_ms: u64,
    /// Model identifier (if applicable).
    pub model: Option<String>,
}

impl OutgoingMessage {
    /// Build a plain reply addressed to the sender of `incoming`.
    pub fn reply_to(incoming: &IncomingMessage, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: MessageMetadata::default(),
            reply_target: Some(incoming.sender_id.clone()),
            reply_token: incoming.reply_token.clone(),
        }
    }
}
