//! Process-local conversation state per user.
//!
//! State is kept in memory only; a restart puts every user back in
//! [`SessionState::Normal`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Where a user is in the prompt-configuration flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Normal,
    /// The next message from this user is the new system prompt.
    AwaitingPromptText,
}

/// Shared map of user id to [`SessionState`].
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    states: Arc<Mutex<HashMap<String, SessionState>>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_states<R>(&self, f: impl FnOnce(&mut HashMap<String, SessionState>) -> R) -> R {
        let mut guard = self.states.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// Current state for a user.
    pub fn state(&self, user_id: &str) -> SessionState {
        self.with_states(|s| s.get(user_id).copied().unwrap_or_default())
    }

    /// Set a user's state. `Normal` removes the entry.
    pub fn set(&self, user_id: &str, state: SessionState) {
        self.with_states(|s| match state {
            SessionState::Normal => {
                s.remove(user_id);
            }
            other => {
                s.insert(user_id.to_string(), other);
            }
        });
    }

    /// Return the current state and reset the user to `Normal`.
    pub fn take(&self, user_id: &str) -> SessionState {
        self.with_states(|s| s.remove(user_id).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_user_is_normal() {
        let tracker = SessionTracker::new();
        assert_eq!(tracker.state("U1"), SessionState::Normal);
    }

    #[test]
    fn test_take_resets_to_normal() {
        let tracker = SessionTracker::new();
        tracker.set("U1", SessionState::AwaitingPromptText);
        assert_eq!(tracker.state("U1"), SessionState::AwaitingPromptText);
        assert_eq!(tracker.take("U1"), SessionState::AwaitingPromptText);
        assert_eq!(tracker.state("U1"), SessionState::Normal);
        assert_eq!(tracker.take("U1"), SessionState::Normal);
    }

    #[test]
    fn test_states_are_per_user_and_shared_across_clones() {
        let tracker = SessionTracker::new();
        let clone = tracker.clone();
        tracker.set("U1", SessionState::AwaitingPromptText);
        assert_eq!(clone.state("U1"), SessionState::AwaitingPromptText);
        assert_eq!(clone.state("U2"), SessionState::Normal);
        clone.set("U1", SessionState::Normal);
        assert_eq!(tracker.state("U1"), SessionState::Normal);
    }
}
