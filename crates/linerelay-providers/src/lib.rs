//! # linerelay-providers
//!
//! Completion API clients. Each one sends a single request per turn,
//! without streaming or retries.

pub mod gemini;
pub mod openai;
pub mod openrouter;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use linerelay_core::{context::ImageData, error::RelayError};
use std::time::Duration;

/// Per-request timeout for completion calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sampling settings shared by all providers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 300,
        }
    }
}

/// HTTP client with the completion timeout applied.
pub(crate) fn build_client() -> Result<reqwest::Client, RelayError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| RelayError::Config(format!("failed to build http client: {e}")))
}

/// Base64 body of an image, as both APIs expect it inline.
pub(crate) fn encode_image(image: &ImageData) -> String {
    BASE64.encode(&image.data)
}
