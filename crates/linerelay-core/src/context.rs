use serde::{Deserialize, Serialize};

/// Hard-coded system prompt used when no default prompt file is available.
pub const FALLBACK_SYSTEM_PROMPT: &str = "你是一個友善、溫暖且樂於助人的AI助手。\
請使用繁體中文與使用者互動，保持簡潔、親切、同理心的語調。";

/// Raw image bytes sent to a provider alongside text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImageData {
    /// Wrap image bytes, detecting the MIME type from their magic number.
    /// Unknown formats are labelled JPEG, which is what LINE delivers.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            mime_type: sniff_image_mime(&data).to_string(),
            data,
        }
    }
}

/// MIME type of an image by its leading bytes.
pub fn sniff_image_mime(data: &[u8]) -> &'static str {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if data.starts_with(b"GIF8") {
        "image/gif"
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

/// A single entry in the conversation history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextEntry {
    /// "user", "assistant", or "system".
    pub role: String,
    /// The message content.
    pub content: String,
    /// Images attached to this entry, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageData>,
}

impl ContextEntry {
    /// A text-only entry.
    pub fn text(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            images: Vec::new(),
        }
    }
}

/// Conversation context passed to an AI provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    /// System prompt prepended to every request.
    pub system_prompt: String,
    /// Conversation history (oldest first).
    pub history: Vec<ContextEntry>,
    /// The current user message.
    pub current_message: String,
    /// Images sent with the current message.
    #[serde(default)]
    pub current_images: Vec<ImageData>,
}

/// A structured message for API-based providers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiMessage {
    /// "user", "assistant", or "system".
    pub role: String,
    /// The message content.
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageData>,
}

impl Context {
    /// Create a new context with just a current message and the fallback system prompt.
    pub fn new(message: &str) -> Self {
        Self {
            system_prompt: FALLBACK_SYSTEM_PROMPT.to_string(),
            history: Vec::new(),
            current_message: message.to_string(),
            current_images: Vec::new(),
        }
    }

    /// Replace the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Replace the history.
    pub fn with_history(mut self, history: Vec<ContextEntry>) -> Self {
        self.history = history;
        self
    }

    /// Attach images to the current message.
    pub fn with_images(mut self, images: Vec<ImageData>) -> Self {
        self.current_images = images;
        self
    }

    /// Convert context to structured API messages.
    ///
    /// Returns `(system_prompt, messages)`. The system prompt is kept separate
    /// because Gemini requires it outside the messages array.
    pub fn to_api_messages(&self) -> (String, Vec<ApiMessage>) {
        let mut messages = Vec::with_capacity(self.history.len() + 1);

        for entry in &self.history {
            messages.push(ApiMessage {
                role: entry.role.clone(),
                content: entry.content.clone(),
                images: entry.images.clone(),
            });
        }

        messages.push(ApiMessage {
            role: "user".to_string(),
            content: self.current_message.clone(),
            images: self.current_images.clone(),
        });

        (self.system_prompt.clone(), messages)
    }
}
