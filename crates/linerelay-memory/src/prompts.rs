//! System prompt resolution: per-user override, then the shared default.

use linerelay_core::{
    config::{shellexpand, MemoryConfig},
    context::FALLBACK_SYSTEM_PROMPT,
    error::RelayError,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::user_file_stem;

/// Per-user prompt overrides with an injected, immutable default.
#[derive(Debug, Clone)]
pub struct PromptStore {
    dir: PathBuf,
    default_prompt: Arc<str>,
}

impl PromptStore {
    /// Create the store, making sure its directory exists.
    pub async fn new(config: &MemoryConfig, default_prompt: String) -> Result<Self, RelayError> {
        let dir = PathBuf::from(shellexpand(&config.prompts_dir));
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            RelayError::Storage(format!(
                "failed to create prompts dir {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self {
            dir,
            default_prompt: default_prompt.into(),
        })
    }

    /// Read the shared default prompt file once at startup.
    ///
    /// A missing, unreadable, or blank file yields [`FALLBACK_SYSTEM_PROMPT`].
    pub async fn load_default(path: &Path) -> String {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) if !raw.trim().is_empty() => {
                info!("default system prompt loaded from {}", path.display());
                raw.trim().to_string()
            }
            Ok(_) => {
                warn!("{} is empty, using built-in prompt", path.display());
                FALLBACK_SYSTEM_PROMPT.to_string()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("{} not found, using built-in prompt", path.display());
                FALLBACK_SYSTEM_PROMPT.to_string()
            }
            Err(e) => {
                warn!("failed to read {}: {e}, using built-in prompt", path.display());
                FALLBACK_SYSTEM_PROMPT.to_string()
            }
        }
    }

    pub fn default_prompt(&self) -> &str {
        &self.default_prompt
    }

    fn path_for(&self, user_id: &str) -> Result<PathBuf, RelayError> {
        Ok(self.dir.join(format!("{}.txt", user_file_stem(user_id)?)))
    }

    /// The user's stored override, if any.
    pub async fn override_for(&self, user_id: &str) -> Result<Option<String>, RelayError> {
        let path = self.path_for(user_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                let text = raw.trim();
                Ok((!text.is_empty()).then(|| text.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RelayError::Storage(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    /// The prompt to use for this user: override if present, else default.
    /// Storage failures are logged and fall back to the default.
    pub async fn effective_prompt(&self, user_id: &str) -> String {
        match self.override_for(user_id).await {
            Ok(Some(prompt)) => prompt,
            Ok(None) => self.default_prompt.to_string(),
            Err(e) => {
                warn!("prompt override unavailable, using default: {e}");
                self.default_prompt.to_string()
            }
        }
    }

    /// Store an override. The content is not validated.
    pub async fn set_override(&self, user_id: &str, text: &str) -> Result<(), RelayError> {
        let path = self.path_for(user_id)?;
        tokio::fs::write(&path, text).await.map_err(|e| {
            RelayError::Storage(format!("failed to write {}: {e}", path.display()))
        })?;
        info!("prompt override set for {user_id}");
        Ok(())
    }

    /// Remove an override. Returns `true` if one existed.
    pub async fn clear_override(&self, user_id: &str) -> Result<bool, RelayError> {
        let path = self.path_for(user_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("prompt override cleared for {user_id}");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RelayError::Storage(format!(
                "failed to remove {}: {e}",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store(dir: &tempfile::TempDir, default_prompt: &str) -> PromptStore {
        let config = MemoryConfig {
            prompts_dir: dir.path().join("prompts").to_string_lossy().to_string(),
            ..MemoryConfig::default()
        };
        PromptStore::new(&config, default_prompt.to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_effective_prompt_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, "Be kind.").await;
        assert_eq!(store.effective_prompt("U1").await, "Be kind.");
    }

    #[tokio::test]
    async fn test_set_override_is_returned_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, "Be kind.").await;
        store.set_override("U1", "You are a pirate.").await.unwrap();
        assert_eq!(store.effective_prompt("U1").await, "You are a pirate.");
        // Other users are unaffected.
        assert_eq!(store.effective_prompt("U2").await, "Be kind.");
    }

    #[tokio::test]
    async fn test_set_then_clear_restores_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, "Be kind.").await;
        store.set_override("U1", "You are a pirate.").await.unwrap();
        assert!(store.clear_override("U1").await.unwrap());
        assert_eq!(store.effective_prompt("U1").await, store.default_prompt());
    }

    #[tokio::test]
    async fn test_clear_without_override_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, "Be kind.").await;
        assert!(!store.clear_override("U1").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_user_id_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, "Be kind.").await;
        assert!(store.set_override("../x", "evil").await.is_err());
        assert_eq!(store.effective_prompt("../x").await, "Be kind.");
    }

    #[tokio::test]
    async fn test_load_default_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system_prompt.txt");
        std::fs::write(&path, "  You are helpful.\n").unwrap();
        assert_eq!(PromptStore::load_default(&path).await, "You are helpful.");
    }

    #[tokio::test]
    async fn test_load_default_missing_file_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.txt");
        assert_eq!(
            PromptStore::load_default(&path).await,
            FALLBACK_SYSTEM_PROMPT
        );
    }

    #[tokio::test]
    async fn test_load_default_blank_file_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.txt");
        std::fs::write(&path, "\n  \n").unwrap();
        assert_eq!(
            PromptStore::load_default(&path).await,
            FALLBACK_SYSTEM_PROMPT
        );
    }
}
