//! LINE webhook payload types and conversion to [`IncomingMessage`].

use chrono::{DateTime, Utc};
use linerelay_core::{
    error::RelayError,
    message::{Attachment, AttachmentType, IncomingMessage},
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub(crate) struct WebhookBody {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub reply_token: Option<String>,
    pub source: Option<EventSource>,
    /// Milliseconds since the epoch.
    pub timestamp: Option<i64>,
    pub message: Option<EventMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventSource {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventMessage {
    /// Message id; also the key for fetching image content.
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: Option<String>,
}

/// Outgoing text bubble.
#[derive(Debug, Serialize)]
pub(crate) struct TextMessage<'a> {
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReplyRequest<'a> {
    pub reply_token: &'a str,
    pub messages: Vec<TextMessage<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PushRequest<'a> {
    pub to: &'a str,
    pub messages: Vec<TextMessage<'a>>,
}

/// Parse a webhook body into text and image messages.
///
/// Events that are not user text or image messages are skipped. Fails
/// only when the body is not valid webhook JSON.
pub fn parse_events(body: &[u8]) -> Result<Vec<IncomingMessage>, RelayError> {
    let parsed: WebhookBody = serde_json::from_slice(body)?;
    Ok(parsed
        .events
        .into_iter()
        .filter_map(into_incoming)
        .collect())
}

fn into_incoming(event: WebhookEvent) -> Option<IncomingMessage> {
    if event.event_type != "message" {
        debug!("line: ignoring {} event", event.event_type);
        return None;
    }
    let message = event.message?;
    let Some(sender_id) = event.source.and_then(|s| s.user_id) else {
        debug!("line: {} event without user id", message.message_type);
        return None;
    };

    let (text, attachments) = match message.message_type.as_str() {
        "text" => {
            let text = message.text.unwrap_or_default().trim().to_string();
            if text.is_empty() {
                return None;
            }
            (text, Vec::new())
        }
        "image" => {
            let Some(content_id) = message.id.filter(|id| !id.is_empty()) else {
                debug!("line: image event without message id");
                return None;
            };
            let image = Attachment {
                file_type: AttachmentType::Image,
                content_id,
            };
            (String::new(), vec![image])
        }
        other => {
            debug!("line: ignoring {other} message");
            return None;
        }
    };
    let timestamp = event
        .timestamp
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(Utc::now);

    Some(IncomingMessage {
        id: Uuid::new_v4(),
        channel: "line".to_string(),
        sender_id,
        text,
        timestamp,
        reply_token: event.reply_token,
        attachments,
    })
}
