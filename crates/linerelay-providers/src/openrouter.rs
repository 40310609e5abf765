//! OpenRouter proxy provider.
//!
//! Reuses OpenAI's request/response types. The endpoint URL is taken
//! verbatim from config, so any OpenAI-compatible proxy can stand in.

use async_trait::async_trait;
use linerelay_core::{
    context::Context, error::RelayError, message::OutgoingMessage, traits::Provider,
};
use tracing::warn;

use crate::openai::chat_complete;
use crate::{build_client, SamplingParams};

/// OpenRouter provider: routes requests to many models via the OpenAI-compatible API.
pub struct OpenRouterProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    sampling: SamplingParams,
}

impl OpenRouterProvider {
    /// Create from config values. `url` is the full chat-completions endpoint.
    pub fn from_config(
        url: String,
        api_key: String,
        model: String,
        sampling: SamplingParams,
    ) -> Result<Self, RelayError> {
        Ok(Self {
            client: build_client()?,
            url,
            api_key,
            model,
            sampling,
        })
    }

    /// Models listing endpoint next to the configured completions URL.
    fn models_url(&self) -> String {
        let base = self
            .url
            .trim_end_matches('/')
            .trim_end_matches("/chat/completions");
        format!("{base}/models")
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn complete(&self, context: &Context) -> Result<OutgoingMessage, RelayError> {
        chat_complete(
            &self.client,
            &self.url,
            &self.api_key,
            &self.model,
            self.sampling,
            context,
            "openrouter",
        )
        .await
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("openrouter: no API key configured");
            return false;
        }
        match self
            .client
            .get(self.models_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("openrouter not available: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(url: String, key: &str) -> OpenRouterProvider {
        OpenRouterProvider::from_config(
            url,
            key.into(),
            "meta-llama/llama-3-8b-instruct".into(),
            SamplingParams {
                temperature: 0.7,
                max_tokens: 300,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_openrouter_provider_name() {
        let p = provider("https://openrouter.ai/api/v1/chat/completions".into(), "sk-or");
        assert_eq!(p.name(), "openrouter");
    }

    #[test]
    fn test_models_url_derived_from_completions_url() {
        let p = provider("https://openrouter.ai/api/v1/chat/completions".into(), "sk-or");
        assert_eq!(p.models_url(), "https://openrouter.ai/api/v1/models");
    }

    #[tokio::test]
    async fn test_complete_posts_to_configured_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/proxy/completions"))
            .and(header("Authorization", "Bearer sk-or"))
            .and(body_partial_json(json!({
                "model": "meta-llama/llama-3-8b-instruct",
                "max_tokens": 300,
                "messages": [
                    {"role": "system", "content": "You are a pirate."},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Arr, ahoy!"}}],
                "model": "meta-llama/llama-3-8b-instruct"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let p = provider(format!("{}/proxy/completions", server.uri()), "sk-or");
        let ctx = Context::new("hello").with_system_prompt("You are a pirate.");
        let out = p.complete(&ctx).await.unwrap();
        assert_eq!(out.text, "Arr, ahoy!");
        assert_eq!(out.metadata.provider_used, "openrouter");
    }

    #[tokio::test]
    async fn test_complete_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let p = provider(format!("{}/chat/completions", server.uri()), "sk-or");
        let err = p.complete(&Context::new("hi")).await.unwrap_err();
        assert!(matches!(err, RelayError::Completion(_)));
    }

    #[tokio::test]
    async fn test_is_available_without_key() {
        let p = provider("http://127.0.0.1:9/chat/completions".into(), "");
        assert!(!p.is_available().await);
    }
}
