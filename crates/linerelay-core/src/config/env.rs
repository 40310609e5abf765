//! Environment overrides, applied on top of the TOML file.

use std::str::FromStr;

use super::Config;
use crate::error::RelayError;

impl Config {
    /// Overlay values from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), RelayError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("LINE_ACCESS_TOKEN") {
            self.channel.line.access_token = v;
        }
        if let Some(v) = get("LINE_CHANNEL_SECRET") {
            self.channel.line.channel_secret = v;
        }
        if let Some(v) = get("LINE_API_BASE_URL") {
            self.channel.line.api_base_url = v;
        }
        if let Some(v) = get("LINE_DATA_API_BASE_URL") {
            self.channel.line.data_api_base_url = v;
        }
        if let Some(v) = get("MAX_LINE_MESSAGE_LENGTH") {
            self.channel.line.max_message_length = parse("MAX_LINE_MESSAGE_LENGTH", &v)?;
        }

        if let Some(v) = get("RELAY_PROVIDER") {
            self.provider.default = v;
        }
        if let Some(v) = get("TEMPERATURE") {
            self.provider.temperature = parse("TEMPERATURE", &v)?;
        }
        if let Some(v) = get("MAX_TOKENS") {
            self.provider.max_tokens = parse("MAX_TOKENS", &v)?;
        }
        if let Some(v) = get("OPENROUTER_API_KEY") {
            self.provider.openrouter.api_key = v;
        }
        if let Some(v) = get("OPENROUTER_URL") {
            self.provider.openrouter.url = v;
        }
        if let Some(v) = get("MODEL_NAME") {
            self.provider.openrouter.model = v.clone();
            self.provider.openai.model = v;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.provider.openai.api_key = v;
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.provider.openai.base_url = v;
        }
        if let Some(v) = get("GEMINI_API_KEY") {
            self.provider.gemini.api_key = v;
        }
        if let Some(v) = get("GEMINI_MODEL") {
            self.provider.gemini.model = v;
        }

        if let Some(v) = get("CHAT_HISTORY_DIR") {
            self.memory.history_dir = v;
        }
        if let Some(v) = get("PROMPTS_DIR") {
            self.memory.prompts_dir = v;
        }
        if let Some(v) = get("IMAGE_DIR") {
            self.memory.image_dir = v;
        }
        if let Some(v) = get("SYSTEM_PROMPT_FILE") {
            self.memory.system_prompt_file = v;
        }
        if let Some(v) = get("MAX_HISTORY_LENGTH") {
            self.memory.max_history_length = parse("MAX_HISTORY_LENGTH", &v)?;
        }

        if let Some(v) = get("RELAY_HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("RELAY_PORT") {
            self.server.port = parse("RELAY_PORT", &v)?;
        }
        if let Some(v) = get("RELAY_LANGUAGE") {
            self.relay.language = v;
        }
        if let Some(v) = get("RELAY_LOG_FILE") {
            self.relay.log_file = Some(v);
        }

        Ok(())
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, RelayError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| RelayError::Config(format!("invalid {key} '{value}': {e}")))
}
