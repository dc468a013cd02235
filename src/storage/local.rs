//! Local filesystem document store.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! └── {collection}/
//!     ├── {id}.json
//!     └── {id}.json
//! ```
//!
//! Each record is written to a temporary file and then hard-linked into
//! place. `hard_link` fails when the target exists, which makes the
//! create atomic per id and never exposes a half-written record.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{Posting, PostingRecord};
use crate::storage::{CreateOutcome, DocumentStore, validate_key};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root_dir: PathBuf,
}

impl LocalStore {
    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn collection_dir(&self, collection: &str) -> Result<PathBuf> {
        validate_key("collection", collection)?;
        Ok(self.root_dir.join(collection))
    }

    fn record_path(&self, collection: &str, id: &str) -> Result<PathBuf> {
        validate_key("id", id)?;
        Ok(self.collection_dir(collection)?.join(format!("{id}.json")))
    }

    /// Record files in a collection, sorted by name.
    async fn record_files(&self, collection: &str) -> Result<Vec<PathBuf>> {
        let dir = self.collection_dir(collection)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl DocumentStore for LocalStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<PostingRecord>> {
        let path = self.record_path(collection, id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        posting: &Posting,
    ) -> Result<CreateOutcome> {
        let path = self.record_path(collection, id)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let record = PostingRecord::new(id, posting, Utc::now());
        let bytes = serde_json::to_vec_pretty(&record)?;

        let tmp = path.with_extension(format!(
            "{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp, &bytes).await?;

        let linked = tokio::fs::hard_link(&tmp, &path).await;
        if let Err(e) = tokio::fs::remove_file(&tmp).await {
            log::warn!("Failed to remove temp file {}: {}", tmp.display(), e);
        }

        match linked {
            Ok(()) => Ok(CreateOutcome::Created(record)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn stream_all(&self, collection: &str) -> Result<Vec<PostingRecord>> {
        let mut records = Vec::new();
        for path in self.record_files(collection).await? {
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                // Deleted between listing and reading
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(AppError::Io(e)),
            };
            match serde_json::from_slice::<PostingRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn delete_batch(&self, collection: &str, limit: usize) -> Result<usize> {
        let mut deleted = 0;
        for path in self.record_files(collection).await?.into_iter().take(limit) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    log::debug!("Deleted {}", path.display());
                    deleted += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(AppError::Io(e)),
            }
        }
        Ok(deleted)
    }
}
