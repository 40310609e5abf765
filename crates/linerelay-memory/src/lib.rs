//! # linerelay-memory
//!
//! Per-user persistent state for the relay, one file per user:
//! - `history`: conversation turns with the keep-last-10 truncation cliff
//! - `images`: image files referenced from history turns
//! - `prompts`: system prompt overrides and the default prompt chain
//! - `session`: process-local conversation state (awaiting prompt text)
//!
//! None of the stores lock. Concurrent writers for the same user follow
//! last-writer-wins.

pub mod history;
pub mod images;
pub mod prompts;
pub mod session;

pub use history::{HistoryStore, Role, Turn};
pub use images::ImageStore;
pub use prompts::PromptStore;
pub use session::{SessionState, SessionTracker};

use linerelay_core::error::RelayError;

/// Build the `user_<id>` file stem, rejecting ids that could escape the store directory.
pub(crate) fn user_file_stem(user_id: &str) -> Result<String, RelayError> {
    let valid = !user_id.is_empty()
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(RelayError::Storage(format!("invalid user id: {user_id:?}")));
    }
    Ok(format!("user_{user_id}"))
}
