//! Media directory for assignment attachments.
//! Files are named `<date>_<name>` and referenced by file name only.

use chrono::NaiveDate;
use mecha_core::error::{MechaError, Result};
use mecha_core::types::MediaKind;
use std::path::{Path, PathBuf};

/// Flat directory of attachment files.
#[derive(Debug, Clone)]
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    /// Use `dir` for media, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!("⚠️ Failed to create media dir {}: {e}", dir.display());
        }
        Self { dir }
    }

    /// Full path of a stored file.
    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Name an upload for `date`: documents keep their original name,
    /// photos become `photo.jpg` and videos `video.mp4`.
    pub fn file_name_for(date: NaiveDate, kind: MediaKind, original: Option<&str>) -> String {
        let suffix = match kind {
            MediaKind::Image => "photo.jpg".to_string(),
            MediaKind::Video => "video.mp4".to_string(),
            MediaKind::Document => original
                .and_then(|name| Path::new(name).file_name())
                .and_then(|name| name.to_str())
                .filter(|name| !name.is_empty())
                .unwrap_or("document")
                .to_string(),
        };
        format!("{}_{suffix}", date.format("%Y-%m-%d"))
    }

    /// Write bytes under `file_name`, replacing any existing file.
    pub fn write(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_of(file_name);
        std::fs::write(&path, bytes).map_err(|e| {
            MechaError::Storage(format!("failed to write media '{}': {e}", path.display()))
        })?;
        tracing::debug!("📎 Stored {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Best-effort delete. Returns whether a file was removed.
    pub fn remove(&self, file_name: &str) -> bool {
        let path = self.path_of(file_name);
        match std::fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("⚠️ Could not remove media {}: {e}", path.display());
                false
            }
        }
    }

    pub fn exists(&self, file_name: &str) -> bool {
        self.path_of(file_name).is_file()
    }
}
