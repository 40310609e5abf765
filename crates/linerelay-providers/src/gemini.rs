//! Google Gemini API provider.
//!
//! Calls the Gemini `generateContent` endpoint. Auth via URL query param.

use async_trait::async_trait;
use linerelay_core::{
    context::{ApiMessage, Context, ImageData},
    error::RelayError,
    message::{MessageMetadata, OutgoingMessage},
    traits::Provider,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::{build_client, encode_image, SamplingParams};

const TOP_P: f32 = 0.95;
const TOP_K: u32 = 64;

/// Google Gemini API provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    sampling: SamplingParams,
}

impl GeminiProvider {
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

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

/// One part of a turn: either text or inline image bytes.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl GeminiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn image(image: &ImageData) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: image.mime_type.clone(),
                data: encode_image(image),
            }),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    total_token_count: u64,
}

/// Map chat roles onto Gemini's: the assistant speaks as `model`, anything
/// else as `user`. Images follow the text of their turn.
fn to_gemini_contents(api_messages: &[ApiMessage]) -> Vec<GeminiContent> {
    api_messages
        .iter()
        .map(|m| {
            let role = if m.role == "assistant" {
                "model"
            } else {
                "user"
            };
            let mut parts = Vec::with_capacity(1 + m.images.len());
            parts.push(GeminiPart::text(m.content.clone()));
            parts.extend(m.images.iter().map(GeminiPart::image));
            GeminiContent {
                role: Some(role.to_string()),
                parts,
            }
        })
        .collect()
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, context: &Context) -> Result<OutgoingMessage, RelayError> {
        let (system, api_messages) = context.to_api_messages();
        let start = Instant::now();

        let system_instruction = if system.is_empty() {
            None
        } else {
            Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart::text(system)],
            })
        };

        let body = GeminiRequest {
            contents: to_gemini_contents(&api_messages),
            system_instruction,
            generation_config: GenerationConfig {
                temperature: self.sampling.temperature,
                top_p: TOP_P,
                top_k: TOP_K,
                max_output_tokens: self.sampling.max_tokens,
            },
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base(),
            self.model,
            self.api_key
        );
        debug!("gemini: POST models/{}:generateContent", self.model);

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Completion(format!("gemini request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(RelayError::Completion(format!(
                "gemini returned {status}: {text}"
            )));
        }

        let parsed: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::Completion(format!("gemini: failed to parse response: {e}")))?;

        let text = parsed
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .map(|t| t.trim().to_string())
            .unwrap_or_default();

        let tokens = parsed.usage_metadata.as_ref().map(|u| u.total_token_count);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        Ok(OutgoingMessage {
            text,
            metadata: MessageMetadata {
                provider_used: "gemini".to_string(),
                tokens_used: tokens,
                processing_time_ms: elapsed_ms,
                model: Some(self.model.clone()),
            },
            reply_target: None,
            reply_token: None,
        })
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("gemini: no API key configured");
            return false;
        }
        let url = format!("{}/models?key={}", self.base(), self.api_key);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("gemini not available: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linerelay_core::context::ContextEntry;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: String) -> GeminiProvider {
        GeminiProvider::from_config(
            base_url,
            "AIza-test".into(),
            "gemini-1.5-flash".into(),
            SamplingParams {
                temperature: 0.5,
                max_tokens: 200,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_gemini_provider_name() {
        let p = provider("https://generativelanguage.googleapis.com/v1beta".into());
        assert_eq!(p.name(), "gemini");
    }

    #[test]
    fn test_gemini_request_serialization() {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".into()),
                parts: vec![GeminiPart::text("Hello")],
            }],
            system_instruction: None,
            generation_config: GenerationConfig {
                temperature: 0.7,
                top_p: TOP_P,
                top_k: TOP_K,
                max_output_tokens: 300,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("systemInstruction").is_none());
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Hello");
        assert!(json["contents"][0]["parts"][0].get("inlineData").is_none());
        assert_eq!(json["generationConfig"]["topK"], 64);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 300);
    }

    #[test]
    fn test_gemini_role_mapping() {
        let api_msgs = vec![
            ApiMessage {
                role: "user".into(),
                content: "Hi".into(),
                ..Default::default()
            },
            ApiMessage {
                role: "assistant".into(),
                content: "Hello!".into(),
                ..Default::default()
            },
        ];
        let contents = to_gemini_contents(&api_msgs);
        assert_eq!(contents[0].role.as_deref(), Some("user"));
        assert_eq!(contents[1].role.as_deref(), Some("model"));
    }

    #[test]
    fn test_gemini_response_parsing() {
        let json = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello "},{"text":"there"}]}}],"usageMetadata":{"totalTokenCount":9}}"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let content = resp.candidates.as_ref().unwrap()[0].content.as_ref().unwrap();
        assert_eq!(content.parts.len(), 2);
        assert_eq!(resp.usage_metadata.unwrap().total_token_count, 9);
    }

    #[tokio::test]
    async fn test_complete_sends_system_instruction_and_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(query_param("key", "AIza-test"))
            .and(body_partial_json(json!({
                "systemInstruction": {"parts": [{"text": "Be brief."}]},
                "contents": [
                    {"role": "user", "parts": [{"text": "Hi"}]},
                    {"role": "model", "parts": [{"text": "Hello!"}]},
                    {"role": "user", "parts": [{"text": "Bye"}]}
                ],
                "generationConfig": {"topK": 64, "maxOutputTokens": 200}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Goodbye!"}]}}],
                "usageMetadata": {"totalTokenCount": 7}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let p = provider(format!("{}/v1beta", server.uri()));
        let ctx = Context::new("Bye")
            .with_system_prompt("Be brief.")
            .with_history(vec![
                ContextEntry::text("user", "Hi"),
                ContextEntry::text("assistant", "Hello!"),
            ]);
        let out = p.complete(&ctx).await.unwrap();
        assert_eq!(out.text, "Goodbye!");
        assert_eq!(out.metadata.tokens_used, Some(7));
    }

    #[tokio::test]
    async fn test_complete_sends_image_as_inline_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(body_partial_json(json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        {"text": "Describe this image."},
                        {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
                    ]
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "A tiny PNG."}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let p = provider(format!("{}/v1beta", server.uri()));
        let png = ImageData::from_bytes(b"\x89PNG\r\n\x1a\n".to_vec());
        let ctx = Context::new("Describe this image.").with_images(vec![png]);
        let out = p.complete(&ctx).await.unwrap();
        assert_eq!(out.text, "A tiny PNG.");
    }

    #[test]
    fn test_response_parts_without_text_are_skipped() {
        let json = r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"image/png","data":""}},{"text":"ok"}]}}]}"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let candidates = resp.candidates.unwrap();
        let parts = &candidates[0].content.as_ref().unwrap().parts;
        assert_eq!(parts[0].text, None);
        assert_eq!(parts[1].text.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_complete_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&server)
            .await;

        let p = provider(format!("{}/v1beta", server.uri()));
        let err = p.complete(&Context::new("hi")).await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }
}
