//! OpenAI-compatible API provider.
//!
//! Works with OpenAI's API and any compatible endpoint.
//! Exports `pub(crate)` types reused by the OpenRouter provider.

use async_trait::async_trait;
use linerelay_core::{
    context::{ApiMessage, Context},
    error::RelayError,
    message::{MessageMetadata, OutgoingMessage},
    traits::Provider,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::{build_client, encode_image, SamplingParams};

/// OpenAI-compatible provider.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    sampling: SamplingParams,
}

impl OpenAiProvider {
    /// Create from config values.
    pub fn from_config(
        base_url: String,
        api_key: String,
        model: String,
        sampling: SamplingParams,
    ) -> Result<Self, RelayError> {
        Ok(Self {
            client: build_client()?,
            base_url,
            api_key,
            model,
            sampling,
        })
    }
}

/// Build OpenAI-format messages from context (system as a message role).
///
/// Messages carrying images switch to the content-parts form, with each
/// image inlined as a base64 data URL.
pub(crate) fn build_openai_messages(system: &str, api_messages: &[ApiMessage]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(api_messages.len() + 1);
    if !system.is_empty() {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: Some(MessageContent::Text(system.to_string())),
        });
    }
    for m in api_messages {
        let content = if m.images.is_empty() {
            MessageContent::Text(m.content.clone())
        } else {
            let mut parts = Vec::with_capacity(1 + m.images.len());
            parts.push(ContentPart::Text {
                text: m.content.clone(),
            });
            parts.extend(m.images.iter().map(|img| ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:{};base64,{}", img.mime_type, encode_image(img)),
                },
            }));
            MessageContent::Parts(parts)
        };
        messages.push(ChatMessage {
            role: m.role.clone(),
            content: Some(content),
        });
    }
    messages
}

#[derive(Serialize, Deserialize, Clone)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: Option<MessageContent>,
}

/// Plain string content, or typed parts when images are attached.
#[derive(Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub(crate) enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// The text of the message; parts are joined.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize, Deserialize, Clone)]
pub(crate) struct ImageUrl {
    pub url: String,
}

#[derive(Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Option<Vec<ChatChoice>>,
    pub model: Option<String>,
    pub usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
pub(crate) struct ChatChoice {
    pub message: Option<ChatMessage>,
}

#[derive(Deserialize)]
pub(crate) struct ChatUsage {
    pub total_tokens: Option<u64>,
}

/// POST a chat-completions request and turn the reply into an [`OutgoingMessage`].
///
/// A response without choices yields empty text; the caller decides what
/// the user sees in that case.
pub(crate) async fn chat_complete(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    model: &str,
    sampling: SamplingParams,
    context: &Context,
    provider_name: &str,
) -> Result<OutgoingMessage, RelayError> {
    let (system, api_messages) = context.to_api_messages();
    let start = Instant::now();

    let body = ChatCompletionRequest {
        model: model.to_string(),
        messages: build_openai_messages(&system, &api_messages),
        max_tokens: sampling.max_tokens,
        temperature: sampling.temperature,
    };

    debug!("{provider_name}: POST {url} model={model}");

    let resp = client
        .post(url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&body)
        .send()
        .await
        .map_err(|e| RelayError::Completion(format!("{provider_name} request failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(RelayError::Completion(format!(
            "{provider_name} returned {status}: {text}"
        )));
    }

    let parsed: ChatCompletionResponse = resp.json().await.map_err(|e| {
        RelayError::Completion(format!("{provider_name}: failed to parse response: {e}"))
    })?;

    let text = parsed
        .choices
        .as_ref()
        .and_then(|c| c.first())
        .and_then(|c| c.message.as_ref())
        .and_then(|m| m.content.as_ref())
        .map(|c| c.text().trim().to_string())
        .unwrap_or_default();

    let tokens = parsed.usage.as_ref().and_then(|u| u.total_tokens);
    let elapsed_ms = start.elapsed().as_millis() as u64;

    Ok(OutgoingMessage {
        text,
        metadata: MessageMetadata {
            provider_used: provider_name.to_string(),
            tokens_used: tokens,
            processing_time_ms: elapsed_ms,
            model: parsed.model.or_else(|| Some(model.to_string())),
        },
        reply_target: None,
        reply_token: None,
    })
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, context: &Context) -> Result<OutgoingMessage, RelayError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        chat_complete(
            &self.client,
            &url,
            &self.api_key,
            &self.model,
            self.sampling,
            context,
            "openai",
        )
        .await
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("openai: no API key configured");
            return false;
        }
        // Basic check: try to list models.
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));
        match self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("openai not available: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linerelay_core::context::{ContextEntry, ImageData};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: String) -> OpenAiProvider {
        OpenAiProvider::from_config(
            base_url,
            "sk-test".into(),
            "gpt-4o-mini".into(),
            SamplingParams {
                temperature: 0.7,
                max_tokens: 300,
            },
        )
        .unwrap()
    }

    fn text_message(role: &str, content: &str) -> ApiMessage {
        ApiMessage {
            role: role.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_openai_provider_name() {
        let p = provider("https://api.openai.com/v1".into());
        assert_eq!(p.name(), "openai");
    }

    #[test]
    fn test_build_openai_messages() {
        let api_msgs = vec![
            text_message("user", "Hi"),
            text_message("assistant", "Hello!"),
            text_message("user", "How?"),
        ];
        let messages = build_openai_messages("Be helpful.", &api_msgs);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(
            messages[0].content.as_ref().map(MessageContent::text).as_deref(),
            Some("Be helpful.")
        );
        assert_eq!(messages[3].role, "user");
    }

    #[test]
    fn test_build_openai_messages_empty_system() {
        let api_msgs = vec![text_message("user", "Hi")];
        let messages = build_openai_messages("", &api_msgs);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
    }

    #[test]
    fn test_openai_response_parsing() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"Hello!"},"finish_reason":"stop"}],"model":"gpt-4o","usage":{"total_tokens":42,"prompt_tokens":10,"completion_tokens":32}}"#;
        let resp: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        let text = resp
            .choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_ref())
            .map(MessageContent::text);
        assert_eq!(text.as_deref(), Some("Hello!"));
        assert_eq!(resp.usage.as_ref().and_then(|u| u.total_tokens), Some(42));
    }

    #[tokio::test]
    async fn test_complete_sends_sampling_and_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "max_tokens": 300,
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "Hi"},
                    {"role": "assistant", "content": "Hello!"},
                    {"role": "user", "content": "Weather?"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "  Sunny.  "}}],
                "usage": {"total_tokens": 12}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let p = provider(format!("{}/v1", server.uri()));
        let ctx = Context::new("Weather?")
            .with_system_prompt("Be brief.")
            .with_history(vec![
                ContextEntry::text("user", "Hi"),
                ContextEntry::text("assistant", "Hello!"),
            ]);
        let out = p.complete(&ctx).await.unwrap();
        assert_eq!(out.text, "Sunny.");
        assert_eq!(out.metadata.provider_used, "openai");
        assert_eq!(out.metadata.tokens_used, Some(12));
    }

    #[test]
    fn test_image_message_uses_content_parts() {
        let mut msg = text_message("user", "What is this?");
        msg.images.push(ImageData::from_bytes(b"GIF89a".to_vec()));
        let messages = build_openai_messages("", &[msg]);

        let json = serde_json::to_value(&messages).unwrap();
        assert_eq!(
            json[0]["content"],
            json!([
                {"type": "text", "text": "What is this?"},
                {"type": "image_url", "image_url": {"url": "data:image/gif;base64,R0lGODlh"}}
            ])
        );
        assert_eq!(json[0]["role"], "user");
    }

    #[tokio::test]
    async fn test_complete_error_status_is_completion_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let p = provider(format!("{}/v1", server.uri()));
        let err = p.complete(&Context::new("hi")).await.unwrap_err();
        assert!(matches!(err, RelayError::Completion(_)));
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn test_complete_without_choices_is_empty_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let p = provider(format!("{}/v1", server.uri()));
        let out = p.complete(&Context::new("hi")).await.unwrap();
        assert!(out.text.is_empty());
    }
}
