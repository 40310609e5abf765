use serde::{Deserialize, Serialize};

use super::defaults::*;

/// Channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    #[serde(default)]
    pub line: LineConfig,
}

/// LINE Messaging API config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineConfig {
    /// Long-lived channel access token (bearer for reply/push).
    #[serde(default)]
    pub access_token: String,
    /// Channel secret, the HMAC key for webhook signatures.
    #[serde(default)]
    pub channel_secret: String,
    #[serde(default = "default_line_api_base_url")]
    pub api_base_url: String,
    /// Host serving message content (images) by message id.
    #[serde(default = "default_line_data_api_base_url")]
    pub data_api_base_url: String,
    /// Maximum characters per outgoing text bubble.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            channel_secret: String::new(),
            api_base_url: default_line_api_base_url(),
            data_api_base_url: default_line_data_api_base_url(),
            max_message_length: default_max_message_length(),
        }
    }
}
