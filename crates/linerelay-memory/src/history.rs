//! Per-user conversation history, stored as one JSON file per user.
//!
//! Truncation is a hard cliff: once the total content length of a history
//! exceeds the configured maximum, everything but the most recent
//! [`KEEP_RECENT_TURNS`] turns is dropped. No summary of the dropped turns
//! is kept, and images they referenced are deleted.
//!
//! Older files are still read: `message` in place of `content`, naive
//! timestamps, summary turns with role `system`, and Gemini-style turns with
//! role `model` and a `parts` list mixing text and image paths.
//!
//! Reads and writes are not locked. Two overlapping read-modify-write
//! cycles for the same user lose the earlier write.

use chrono::{DateTime, NaiveDateTime, Utc};
use linerelay_core::{
    config::{shellexpand, MemoryConfig},
    context::ContextEntry,
    error::RelayError,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::{user_file_stem, ImageStore};

/// Number of turns retained when a history is truncated.
pub const KEEP_RECENT_TURNS: usize = 10;

/// Author of a turn. Summary turns were sent to the model as user text,
/// so `system` reads as `user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "system")]
    User,
    #[serde(alias = "model")]
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredTurn")]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Paths of images sent with this turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Every turn shape found in history files, current and legacy.
#[derive(Deserialize)]
struct StoredTurn {
    role: Role,
    #[serde(default, alias = "message")]
    content: Option<String>,
    #[serde(default)]
    parts: Vec<serde_json::Value>,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    timestamp: Option<DateTime<Utc>>,
}

impl TryFrom<StoredTurn> for Turn {
    type Error = String;

    fn try_from(stored: StoredTurn) -> Result<Self, Self::Error> {
        let mut images = stored.images;
        let content = match stored.content {
            Some(content) => content,
            None if !stored.parts.is_empty() => {
                let mut texts = Vec::new();
                for part in stored.parts {
                    if let serde_json::Value::String(part) = part {
                        if is_image_path(&part) {
                            images.push(part);
                        } else {
                            texts.push(part);
                        }
                    }
                }
                texts.join("\n")
            }
            None => return Err("turn has neither content nor parts".to_string()),
        };
        Ok(Self {
            role: stored.role,
            content,
            images,
            // Gemini-style files carry no timestamps.
            timestamp: stored.timestamp.unwrap_or_default(),
        })
    }
}

/// A `parts` entry that is a saved image path rather than text.
fn is_image_path(part: &str) -> bool {
    !part.contains(char::is_whitespace)
        && Path::new(part)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                ["png", "jpg", "jpeg", "gif", "webp"].contains(&ext.to_ascii_lowercase().as_str())
            })
}

impl Turn {
    /// A user turn stamped with the current time.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// An assistant turn stamped with the current time.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach saved image paths.
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// Text-only view of a turn; images are loaded separately by the caller.
impl From<&Turn> for ContextEntry {
    fn from(turn: &Turn) -> Self {
        ContextEntry::text(turn.role.as_str(), turn.content.clone())
    }
}

/// Accept RFC 3339 timestamps and the naive ISO form older files carry.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

/// Length of a history as measured against the truncation threshold:
/// the total number of characters across all turn contents.
pub fn content_length(turns: &[Turn]) -> usize {
    turns.iter().map(|t| t.content.chars().count()).sum()
}

/// Apply the truncation cliff. Returns the history unchanged when it is
/// within `max_length`, otherwise only its last [`KEEP_RECENT_TURNS`] turns.
pub fn truncate(turns: Vec<Turn>, max_length: usize) -> Vec<Turn> {
    split_truncated(turns, max_length).0
}

/// Like [`truncate`], also returning the dropped turns, oldest first.
fn split_truncated(mut turns: Vec<Turn>, max_length: usize) -> (Vec<Turn>, Vec<Turn>) {
    let total = content_length(&turns);
    if total > max_length && turns.len() > KEEP_RECENT_TURNS {
        info!(
            "history over limit ({total} > {max_length}), keeping last {KEEP_RECENT_TURNS} of {} turns",
            turns.len()
        );
        let kept = turns.split_off(turns.len() - KEEP_RECENT_TURNS);
        return (kept, turns);
    }
    (turns, Vec::new())
}

/// File-per-user history store. Owns the images its turns refer to.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
    max_length: usize,
    images: ImageStore,
}

impl HistoryStore {
    /// Create the store, making sure its directory exists.
    pub async fn new(config: &MemoryConfig) -> Result<Self, RelayError> {
        let dir = PathBuf::from(shellexpand(&config.history_dir));
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            RelayError::Storage(format!(
                "failed to create history dir {}: {e}",
                dir.display()
            ))
        })?;
        info!("History store initialized at {}", dir.display());
        Ok(Self {
            dir,
            max_length: config.max_history_length,
            images: ImageStore::new(config).await?,
        })
    }

    /// Store for the images referenced from history turns.
    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    fn path_for(&self, user_id: &str) -> Result<PathBuf, RelayError> {
        Ok(self.dir.join(format!("{}.json", user_file_stem(user_id)?)))
    }

    /// Load a user's history. Missing, unreadable, or corrupt files yield an
    /// empty history.
    pub async fn load(&self, user_id: &str) -> Vec<Turn> {
        let path = match self.path_for(user_id) {
            Ok(p) => p,
            Err(e) => {
                warn!("history load skipped: {e}");
                return Vec::new();
            }
        };

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no history for {user_id}, starting fresh");
                return Vec::new();
            }
            Err(e) => {
                warn!("failed to read history {}: {e}", path.display());
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Turn>>(&raw) {
            Ok(turns) => {
                debug!("loaded {} turns for {user_id}", turns.len());
                turns
            }
            Err(e) => {
                warn!("corrupt history {}, treating as empty: {e}", path.display());
                Vec::new()
            }
        }
    }

    /// Truncate and write a user's history. Returns the turns actually written.
    ///
    /// Images of dropped turns are deleted once the shorter history is on disk.
    pub async fn save(&self, user_id: &str, turns: Vec<Turn>) -> Result<Vec<Turn>, RelayError> {
        let path = self.path_for(user_id)?;
        let (turns, dropped) = split_truncated(turns, self.max_length);
        let json = serde_json::to_string_pretty(&turns)?;
        tokio::fs::write(&path, json).await.map_err(|e| {
            RelayError::Storage(format!("failed to write {}: {e}", path.display()))
        })?;
        debug!("saved {} turns for {user_id}", turns.len());
        self.remove_images(&dropped).await;
        Ok(turns)
    }

    async fn remove_images(&self, turns: &[Turn]) {
        for path in turns.iter().flat_map(|t| &t.images) {
            self.images.remove(path).await;
        }
    }

    /// Append one turn: load, push, save.
    pub async fn append(&self, user_id: &str, turn: Turn) -> Result<(), RelayError> {
        let mut turns = self.load(user_id).await;
        turns.push(turn);
        self.save(user_id, turns).await?;
        Ok(())
    }

    /// Delete a user's history and its images. Returns `true` if a file was removed.
    pub async fn clear(&self, user_id: &str) -> Result<bool, RelayError> {
        let path = self.path_for(user_id)?;
        let turns = self.load(user_id).await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("cleared history for {user_id}");
                self.remove_images(&turns).await;
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

    async fn test_store(dir: &tempfile::TempDir, max_length: usize) -> HistoryStore {
        let config = MemoryConfig {
            history_dir: dir.path().join("history").to_string_lossy().to_string(),
            image_dir: dir.path().join("images").to_string_lossy().to_string(),
            max_history_length: max_length,
            ..MemoryConfig::default()
        };
        HistoryStore::new(&config).await.unwrap()
    }

    fn turns(n: usize, content: &str) -> Vec<Turn> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Turn::user(format!("{content}{i}"))
                } else {
                    Turn::assistant(format!("{content}{i}"))
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_load_missing_user_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, 4000).await;
        assert!(store.load("Unobody").await.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, 4000).await;
        let path = store.path_for("Ubroken").unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(store.load("Ubroken").await.is_empty());
    }

    #[tokio::test]
    async fn test_load_invalid_user_id_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, 4000).await;
        assert!(store.load("../../etc").await.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, 4000).await;
        let history = vec![Turn::user("你好"), Turn::assistant("嗨，朋友！")];
        store.save("U1", history.clone()).await.unwrap();

        let loaded = store.load("U1").await;
        assert_eq!(loaded, history);
    }

    #[tokio::test]
    async fn test_save_writes_unescaped_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, 4000).await;
        store.save("U1", vec![Turn::user("你好")]).await.unwrap();
        let raw = std::fs::read_to_string(store.path_for("U1").unwrap()).unwrap();
        assert!(raw.contains("你好"));
        assert!(raw.contains("\"role\": \"user\""));
    }

    #[tokio::test]
    async fn test_save_over_limit_keeps_last_ten() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, 50).await;
        let history = turns(25, "message number ");
        let expected: Vec<Turn> = history[15..].to_vec();

        let written = store.save("U1", history).await.unwrap();
        assert_eq!(written.len(), KEEP_RECENT_TURNS);
        assert_eq!(store.load("U1").await, expected);
    }

    #[tokio::test]
    async fn test_save_under_limit_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, 100_000).await;
        let history = turns(25, "m");
        let written = store.save("U1", history).await.unwrap();
        assert_eq!(written.len(), 25);
    }

    #[test]
    fn test_truncate_is_a_cliff_not_a_window() {
        // Exactly at the threshold nothing is dropped.
        let history = turns(12, "abcdefghi");
        let len = content_length(&history);
        assert_eq!(truncate(history.clone(), len).len(), 12);
        // One past it, the history drops to ten turns even though
        // removing a single turn would be enough.
        assert_eq!(truncate(history, len - 1).len(), KEEP_RECENT_TURNS);
    }

    #[test]
    fn test_truncate_short_history_over_limit_is_unchanged() {
        let history = turns(4, &"x".repeat(100));
        assert_eq!(truncate(history, 10).len(), 4);
    }

    #[test]
    fn test_content_length_counts_chars_not_bytes() {
        let history = vec![Turn::user("你好"), Turn::assistant("abc")];
        assert_eq!(content_length(&history), 5);
    }

    #[tokio::test]
    async fn test_append_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, 4000).await;
        store.append("U1", Turn::user("one")).await.unwrap();
        store.append("U1", Turn::assistant("two")).await.unwrap();
        let loaded = store.load("U1").await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].content, "two");
        assert_eq!(loaded[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_clear_removes_only_that_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, 4000).await;
        store.append("Ualice", Turn::user("hi")).await.unwrap();
        store.append("Ubob", Turn::user("yo")).await.unwrap();

        assert!(store.clear("Ualice").await.unwrap());
        assert!(store.load("Ualice").await.is_empty());
        assert_eq!(store.load("Ubob").await.len(), 1);
        assert!(!store.clear("Ualice").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_read_modify_write_loses_a_turn() {
        // Both writers read the same prior history; the later save wins.
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, 4000).await;
        store.append("U1", Turn::user("first")).await.unwrap();

        let mut a = store.load("U1").await;
        let mut b = store.load("U1").await;
        a.push(Turn::user("from a"));
        b.push(Turn::user("from b"));
        store.save("U1", a).await.unwrap();
        store.save("U1", b).await.unwrap();

        let contents: Vec<String> = store
            .load("U1")
            .await
            .into_iter()
            .map(|t| t.content)
            .collect();
        assert_eq!(contents, vec!["first", "from b"]);
    }

    #[test]
    fn test_legacy_turn_format_parses() {
        let json = r#"[{"role":"user","message":"哈囉","timestamp":"2024-05-01T12:30:00.123456"},
                      {"role":"assistant","content":"你好","timestamp":"2024-05-01T12:30:05+08:00"}]"#;
        let turns: Vec<Turn> = serde_json::from_str(json).unwrap();
        assert_eq!(turns[0].content, "哈囉");
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].timestamp.to_rfc3339(), "2024-05-01T04:30:05+00:00");
    }

    #[test]
    fn test_summary_and_gemini_turns_parse() {
        let json = r#"[
            {"role":"system","message":"對話摘要：聊了天氣","timestamp":"2024-05-01T12:30:00.123456"},
            {"role":"user","parts":["請詳細描述這張圖片的內容。","images/U1_480123.png"]},
            {"role":"model","parts":["一隻貓。"]},
            {"role":"user","parts":["hello", "world"]}
        ]"#;
        let turns: Vec<Turn> = serde_json::from_str(json).unwrap();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "對話摘要：聊了天氣");
        assert_eq!(turns[1].content, "請詳細描述這張圖片的內容。");
        assert_eq!(turns[1].images, vec!["images/U1_480123.png"]);
        assert_eq!(turns[1].timestamp, DateTime::<Utc>::default());
        assert_eq!(turns[2].role, Role::Assistant);
        assert_eq!(turns[2].content, "一隻貓。");
        assert_eq!(turns[3].content, "hello\nworld");
        assert!(turns[3].images.is_empty());
    }

    #[tokio::test]
    async fn test_load_reads_legacy_file_instead_of_dropping_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, 4000).await;
        let raw = r#"[{"role":"user","parts":["hi"]},{"role":"model","parts":["hello"]}]"#;
        std::fs::write(store.path_for("U1").unwrap(), raw).unwrap();

        let loaded = store.load("U1").await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].role, Role::Assistant);

        // Saving rewrites it in the current shape.
        store.save("U1", loaded).await.unwrap();
        let rewritten = std::fs::read_to_string(store.path_for("U1").unwrap()).unwrap();
        assert!(rewritten.contains("\"role\": \"assistant\""));
        assert!(!rewritten.contains("parts"));
    }

    #[test]
    fn test_turn_without_content_is_rejected() {
        let json = r#"{"role":"user","timestamp":"2024-05-01T12:30:00Z"}"#;
        assert!(serde_json::from_str::<Turn>(json).is_err());
    }

    #[tokio::test]
    async fn test_truncation_deletes_images_of_dropped_turns() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, 50).await;
        let old = store.images().save("U1", "1", &[0xFF, 0xD8]).await.unwrap();
        let recent = store.images().save("U1", "2", &[0xFF, 0xD8]).await.unwrap();

        let mut history = vec![Turn::user("describe").with_images(vec![old.clone()])];
        history.extend(turns(10, "message number "));
        history.push(Turn::user("describe").with_images(vec![recent.clone()]));
        let written = store.save("U1", history).await.unwrap();

        assert_eq!(written.len(), KEEP_RECENT_TURNS);
        assert!(!Path::new(&old).exists());
        assert!(Path::new(&recent).exists());
        assert_eq!(store.load("U1").await.last().unwrap().images, vec![recent]);
    }

    #[tokio::test]
    async fn test_clear_deletes_user_images() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, 4000).await;
        let image = store.images().save("U1", "9", &[0xFF, 0xD8]).await.unwrap();
        store
            .append("U1", Turn::user("describe").with_images(vec![image.clone()]))
            .await
            .unwrap();

        assert!(store.clear("U1").await.unwrap());
        assert!(!Path::new(&image).exists());
    }

    #[test]
    fn test_turn_into_context_entry() {
        let entry = ContextEntry::from(&Turn::assistant("ok"));
        assert_eq!(entry.role, "assistant");
        assert_eq!(entry.content, "ok");
    }
}
