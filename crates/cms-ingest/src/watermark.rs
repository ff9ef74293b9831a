//! Persisted sync watermark
//!
//! The watermark lives in a small JSON document:
//!
//! ```json
//! { "last_run_time": "2024-05-01T12:00:00.000000Z" }
//! ```
//!
//! It is read once when a run starts and replaced once when it ends.

use cms_common::types::Watermark;
use cms_common::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
struct WatermarkFile {
    #[serde(default)]
    last_run_time: Watermark,
}

/// File-backed watermark storage
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    path: PathBuf,
}

impl WatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored watermark
    ///
    /// A missing, unreadable or corrupt file yields the empty sentinel, which
    /// makes every catalog entry eligible again.
    pub async fn load(&self) -> Watermark {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No watermark file, starting from scratch");
                return Watermark::empty();
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Watermark file unreadable, ignoring it");
                return Watermark::empty();
            },
        };

        match serde_json::from_slice::<WatermarkFile>(&raw) {
            Ok(file) => file.last_run_time,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Watermark file is corrupt, ignoring it");
                Watermark::empty()
            },
        }
    }

    /// Replace the stored watermark
    ///
    /// Writes a sibling temp file and renames it over the target, so readers
    /// see either the old or the new document.
    pub async fn save(&self, watermark: &Watermark) -> Result<()> {
        let temp_path = self.temp_path()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_vec(&WatermarkFile {
            last_run_time: watermark.clone(),
        })?;

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.path).await?;

        debug!(path = %self.path.display(), watermark = %watermark, "Watermark saved");
        Ok(())
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let name = self.path.file_name().ok_or_else(|| {
            IngestError::config(format!(
                "Watermark path '{}' does not name a file",
                self.path.display()
            ))
        })?;

        let mut temp_name = OsString::from(".");
        temp_name.push(name);
        temp_name.push(".tmp");
        Ok(self.path.with_file_name(temp_name))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_without_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = WatermarkStore::new(dir.path().join("metadata.json"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = WatermarkStore::new(dir.path().join("metadata.json"));
        let w = Watermark::new("2024-05-01T12:00:00.000000Z");

        store.save(&w).await.unwrap();
        assert_eq!(store.load().await, w);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["last_run_time"], "2024-05-01T12:00:00.000000Z");
    }

    #[tokio::test]
    async fn test_resaving_loaded_value_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = WatermarkStore::new(dir.path().join("metadata.json"));
        store.save(&Watermark::new("2024-01-01T00:00:00Z")).await.unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let loaded = store.load().await;
        store.save(&loaded).await.unwrap();

        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = WatermarkStore::new(dir.path().join("metadata.json"));
        store.save(&Watermark::new("2024-01-01T00:00:00Z")).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["metadata.json".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.json");

        std::fs::write(&path, b"{\"last_run_time\": ").unwrap();
        assert!(WatermarkStore::new(&path).load().await.is_empty());

        std::fs::write(&path, b"{\"last_run_time\": 42}").unwrap();
        assert!(WatermarkStore::new(&path).load().await.is_empty());

        std::fs::write(&path, b"{}").unwrap();
        assert!(WatermarkStore::new(&path).load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let store = WatermarkStore::new(dir.path().join("state").join("metadata.json"));
        store.save(&Watermark::new("2024-01-01T00:00:00Z")).await.unwrap();
        assert_eq!(store.load().await.as_str(), "2024-01-01T00:00:00Z");
    }
}
