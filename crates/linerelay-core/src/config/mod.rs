mod channels;
mod defaults;
mod env;
mod providers;


pub use channels::*;
pub use providers::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::RelayError;
use defaults::*;

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Optional log file, written in addition to stderr.
    #[serde(default)]
    pub log_file: Option<String>,
    /// Language of fixed bot replies ("zh-TW" or "English").
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_file: None,
            language: default_language(),
        }
    }
}

/// HTTP server config for the webhook and health endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// File-backed history and prompt storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Directory holding one `user_<id>.json` history file per user.
    #[serde(default = "default_history_dir")]
    pub history_dir: String,
    /// Directory holding one `user_<id>.txt` prompt override per user.
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: String,
    /// Directory holding images users sent, referenced from their history.
    #[serde(default = "default_image_dir")]
    pub image_dir: String,
    /// Shared default system prompt, read once at startup.
    #[serde(default = "default_system_prompt_file")]
    pub system_prompt_file: String,
    /// Content length (characters) above which history is cut to the last 10 turns.
    #[serde(default = "default_max_history_length")]
    pub max_history_length: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            history_dir: default_history_dir(),
            prompts_dir: default_prompts_dir(),
            image_dir: default_image_dir(),
            system_prompt_file: default_system_prompt_file(),
            max_history_length: default_max_history_length(),
        }
    }
}

impl Config {
    /// Check that every value needed to serve traffic is present.
    ///
    /// All missing settings are reported in a single error, named by
    /// their environment variable.
    pub fn validate(&self) -> Result<(), RelayError> {
        let mut missing = Vec::new();

        if self.channel.line.access_token.is_empty() {
            missing.push("LINE_ACCESS_TOKEN");
        }
        if self.channel.line.channel_secret.is_empty() {
            missing.push("LINE_CHANNEL_SECRET");
        }

        match self.provider.default.as_str() {
            "openrouter" => {
                if self.provider.openrouter.url.is_empty() {
                    missing.push("OPENROUTER_URL");
                }
                if self.provider.openrouter.api_key.is_empty() {
                    missing.push("OPENROUTER_API_KEY");
                }
                if self.provider.openrouter.model.is_empty() {
                    missing.push("MODEL_NAME");
                }
            }
            "openai" => {
                if self.provider.openai.api_key.is_empty() {
                    missing.push("OPENAI_API_KEY");
                }
            }
            "gemini" => {
                if self.provider.gemini.api_key.is_empty() {
                    missing.push("GEMINI_API_KEY");
                }
            }
            other => {
                return Err(RelayError::Config(format!("unsupported provider: {other}")));
            }
        }

        if self.channel.line.max_message_length == 0 {
            return Err(RelayError::Config(
                "max_message_length must be greater than zero".to_string(),
            ));
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(RelayError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. Environment
/// overrides are applied separately via [`Config::apply_env_overrides`].
pub fn load(path: &str) -> Result<Config, RelayError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| RelayError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| RelayError::Config(format!("failed to parse config: {}", e)))?;

    Ok(config)
}
