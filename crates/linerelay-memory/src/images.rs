//! Images users sent, kept on disk so later turns can show them again.
//!
//! History turns refer to images by path. A path is only read or deleted
//! when it lies inside the store directory.

use linerelay_core::{
    config::{shellexpand, MemoryConfig},
    context::{sniff_image_mime, ImageData},
    error::RelayError,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::user_file_stem;

/// Directory of saved user images.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Create the store, making sure its directory exists.
    pub async fn new(config: &MemoryConfig) -> Result<Self, RelayError> {
        let dir = PathBuf::from(shellexpand(&config.image_dir));
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            RelayError::Storage(format!("failed to create image dir {}: {e}", dir.display()))
        })?;
        info!("Image store initialized at {}", dir.display());
        Ok(Self { dir })
    }

    /// Whether `path` names a file directly inside this store.
    pub fn owns(&self, path: &Path) -> bool {
        path.parent() == Some(self.dir.as_path())
            && path
                .file_name()
                .is_some_and(|name| !name.to_string_lossy().starts_with('.'))
    }

    /// Write an image as `user_<id>_<content id>.<ext>` and return its path.
    pub async fn save(
        &self,
        user_id: &str,
        content_id: &str,
        data: &[u8],
    ) -> Result<String, RelayError> {
        let valid_id =
            !content_id.is_empty() && content_id.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid_id {
            return Err(RelayError::Storage(format!(
                "invalid content id: {content_id:?}"
            )));
        }
        let ext = match sniff_image_mime(data) {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "jpg",
        };
        let path = self
            .dir
            .join(format!("{}_{content_id}.{ext}", user_file_stem(user_id)?));
        tokio::fs::write(&path, data).await.map_err(|e| {
            RelayError::Storage(format!("failed to write {}: {e}", path.display()))
        })?;
        debug!("saved {} byte image to {}", data.len(), path.display());
        Ok(path.to_string_lossy().into_owned())
    }

    /// Read an image back. Missing files and paths outside the store yield `None`.
    pub async fn load(&self, path: &str) -> Option<ImageData> {
        let path = Path::new(path);
        if !self.owns(path) {
            warn!("image path {} is outside the store", path.display());
            return None;
        }
        match tokio::fs::read(path).await {
            Ok(data) => Some(ImageData::from_bytes(data)),
            Err(e) => {
                warn!("image {} unavailable: {e}", path.display());
                None
            }
        }
    }

    /// Delete an image. Already-missing files and foreign paths are ignored.
    pub async fn remove(&self, path: &str) {
        let path = Path::new(path);
        if !self.owns(path) {
            debug!("not removing {}: outside the store", path.display());
            return;
        }
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("removed image {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("failed to remove image {}: {e}", path.display()),
        }
    }
}
