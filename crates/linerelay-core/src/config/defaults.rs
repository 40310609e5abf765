//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "linerelay".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_language() -> String {
    "zh-TW".to_string()
}

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    5566
}

pub fn default_line_api_base_url() -> String {
    "https://api.line.me".to_string()
}

pub fn default_line_data_api_base_url() -> String {
    "https://api-data.line.me".to_string()
}

pub fn default_max_message_length() -> usize {
    1000
}

pub fn default_provider() -> String {
    "openrouter".to_string()
}

pub fn default_temperature() -> f32 {
    0.7
}

pub fn default_max_tokens() -> u32 {
    300
}

pub fn default_openrouter_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

pub fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

pub fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

pub fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

pub fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

pub fn default_history_dir() -> String {
    "history".to_string()
}

pub fn default_prompts_dir() -> String {
    "prompts".to_string()
}

pub fn default_image_dir() -> String {
    "images".to_string()
}

pub fn default_system_prompt_file() -> String {
    "system_prompt.txt".to_string()
}

pub fn default_max_history_length() -> usize {
    4000
}
