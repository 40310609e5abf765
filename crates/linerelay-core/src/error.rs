use thiserror::Error;

/// Top-level error type for the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Inbound webhook failed signature verification.
    #[error("auth error: {0}")]
    Auth(String),

    /// History or prompt file could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),

    /// The completion API call failed or returned an error.
    #[error("completion error: {0}")]
    Completion(String),

    /// A reply could not be delivered through the messaging platform.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// An inbound attachment could not be fetched from the platform.
    #[error("attachment error: {0}")]
    Attachment(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
