//! Document store abstractions for posting persistence.
//!
//! Records are keyed by their content-addressed id inside a named
//! collection. Writes are create-only: [`DocumentStore::create_if_absent`]
//! is the single write path and must be atomic per key, so two runs that
//! discover the same posting can never both create it.
//!
//! ## Backends
//!
//! ```text
//! LocalStore    {records_dir}/{collection}/{id}.json
//! S3Store       s3://{bucket}/{prefix}/{collection}/{id}.json   (feature "s3")
//! MemoryStore   in-process, for tests
//! ```

pub mod local;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Posting, PostingRecord, StoreBackend, StoreConfig};

// Re-export for convenience
pub use local::LocalStore;
pub use memory::MemoryStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

/// Result of a conditional create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The record did not exist and was written
    Created(PostingRecord),
    /// A record with this id was already stored; nothing was written
    AlreadyExists,
}

/// Trait for durable keyed document storage.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point lookup by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<PostingRecord>>;

    /// Whether a record with this id exists.
    async fn exists(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self.get(collection, id).await?.is_some())
    }

    /// Write the posting under `id` unless a record already exists.
    ///
    /// The store assigns `created_at`.
    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        posting: &Posting,
    ) -> Result<CreateOutcome>;

    /// Every record in the collection, oldest first.
    async fn stream_all(&self, collection: &str) -> Result<Vec<PostingRecord>>;

    /// Delete up to `limit` records, returning how many were removed.
    async fn delete_batch(&self, collection: &str, limit: usize) -> Result<usize>;
}

/// Open the configured store backend.
///
/// `storage_dir` anchors the local backend's records directory.
pub async fn open_store(config: &StoreConfig, storage_dir: &Path) -> Result<Arc<dyn DocumentStore>> {
    match config.backend {
        StoreBackend::Local => {
            let root = storage_dir.join(&config.records_dir);
            log::info!("Using local document store at {}", root.display());
            Ok(Arc::new(LocalStore::new(root)))
        }
        #[cfg(feature = "s3")]
        StoreBackend::S3 => Ok(Arc::new(S3Store::from_config(config).await?)),
        #[cfg(not(feature = "s3"))]
        StoreBackend::S3 => Err(crate::error::AppError::config(
            "store.backend = \"s3\" requires the `s3` feature",
        )),
    }
}

/// Reject keys that would escape their collection.
pub(crate) fn validate_key(kind: &str, key: &str) -> Result<()> {
    let safe = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if safe {
        Ok(())
    } else {
        Err(crate::error::AppError::validation(format!(
            "Invalid {kind} '{key}': only ASCII letters, digits, '_' and '-' are allowed"
        )))
    }
}
