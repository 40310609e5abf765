//! Provider factory: builds the configured completion provider from config.

use linerelay_core::{config, traits::Provider};
use linerelay_providers::{
    gemini::GeminiProvider, openai::OpenAiProvider, openrouter::OpenRouterProvider, SamplingParams,
};

/// Build the provider named by `provider.default`.
pub fn build_provider(cfg: &config::Config) -> anyhow::Result<Box<dyn Provider>> {
    let sampling = SamplingParams {
        temperature: cfg.provider.temperature,
        max_tokens: cfg.provider.max_tokens,
    };

    match cfg.provider.default.as_str() {
        "openrouter" => {
            let oc = &cfg.provider.openrouter;
            Ok(Box::new(OpenRouterProvider::from_config(
                oc.url.clone(),
                oc.api_key.clone(),
                oc.model.clone(),
                sampling,
            )?))
        }
        "openai" => {
            let oc = &cfg.provider.openai;
            Ok(Box::new(OpenAiProvider::from_config(
                oc.base_url.clone(),
                oc.api_key.clone(),
                oc.model.clone(),
                sampling,
            )?))
        }
        "gemini" => {
            let gc = &cfg.provider.gemini;
            Ok(Box::new(GeminiProvider::from_config(
                gc.base_url.clone(),
                gc.api_key.clone(),
                gc.model.clone(),
                sampling,
            )?))
        }
        other => anyhow::bail!("unsupported provider: {other}"),
    }
}
