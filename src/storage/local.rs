//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── <id>.md5              # Hash artifact
//! ├── <id>.site             # Content artifact
//! └── <id>.site.tmp         # Only present while a write is in flight
//!                           # (or after one was interrupted)
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{ResourceId, ResourceState};
use crate::storage::{CONTENT_EXT, HASH_EXT, StateStore};

/// Suffix of an artifact while its write is in flight.
const TMP_SUFFIX: &str = ".tmp";

/// Local filesystem state store.
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    root_dir: PathBuf,
}

impl LocalStateStore {
    /// Create a new LocalStateStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Directory holding the artifacts.
    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Create the root directory if it is missing.
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await?;
        Ok(())
    }

    /// Get the full path for an artifact.
    fn path(&self, id: &ResourceId, ext: &str) -> PathBuf {
        self.root_dir.join(format!("{}.{}", id, ext))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(TMP_SUFFIX);
        let tmp = PathBuf::from(tmp);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, path: &Path) -> std::io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn remove(&self, path: &Path) -> std::io::Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// `<id>.md5` or `<id>.site`, including temp files left by an interrupted write.
    fn is_artifact(path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return false;
        };
        let name = name.strip_suffix(TMP_SUFFIX).unwrap_or(name);
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == HASH_EXT || ext == CONTENT_EXT)
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load(&self, id: &ResourceId) -> Result<ResourceState> {
        let hash_path = self.path(id, HASH_EXT);
        let hash = self
            .read_bytes(&hash_path)
            .await
            .map_err(|e| AppError::storage(id.as_str(), e))?
            .map(|bytes| {
                String::from_utf8_lossy(&bytes)
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string()
            });

        match &hash {
            Some(_) => log::debug!("Load hash from file '{}'", hash_path.display()),
            None => log::debug!("No hash file '{}'", hash_path.display()),
        }

        let content_path = self.path(id, CONTENT_EXT);
        let content = self
            .read_bytes(&content_path)
            .await
            .map_err(|e| AppError::storage(id.as_str(), e))?;

        if content.is_some() {
            log::debug!("Read site content from file '{}'", content_path.display());
        }

        Ok(ResourceState { hash, content })
    }

    async fn commit(&self, id: &ResourceId, hash: &str, content: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let content_path = self.path(id, CONTENT_EXT);
        log::debug!("Save new site content to file '{}'", content_path.display());
        self.write_bytes(&content_path, content)
            .await
            .map_err(|e| AppError::storage(id.as_str(), e))?;

        let hash_path = self.path(id, HASH_EXT);
        log::debug!("Save new site hash to file '{}'", hash_path.display());
        self.write_bytes(&hash_path, hash.as_bytes())
            .await
            .map_err(|e| AppError::storage(id.as_str(), e))?;

        Ok(())
    }

    async fn clear(&self, id: &ResourceId) -> Result<()> {
        // Hash first so a half-cleared resource reads as new.
        for ext in [HASH_EXT, CONTENT_EXT] {
            self.remove(&self.path(id, ext))
                .await
                .map_err(|e| AppError::storage(id.as_str(), e))?;
        }
        Ok(())
    }

    async fn clear_all(&self) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if Self::is_artifact(&path) && self.remove(&path).await? {
                removed += 1;
            }
        }

        Ok(removed)
    }

    async fn last_modified(&self, id: &ResourceId) -> Option<DateTime<Local>> {
        let metadata = tokio::fs::metadata(self.path(id, HASH_EXT)).await.ok()?;
        metadata.modified().ok().map(DateTime::<Local>::from)
    }
}
