//! Deduplicating persistence of postings.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{Posting, PostingRecord, StoreConfig, posting_id};
use crate::storage::{CreateOutcome, DocumentStore};

/// Result of saving a posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// First sighting; the record was written
    Created(PostingRecord),
    /// Already stored by an earlier (or concurrent) run
    Duplicate,
}

/// Postings keyed by the hash of their link.
#[derive(Clone)]
pub struct PostingRepository {
    store: Arc<dyn DocumentStore>,
    collection: String,
    timeout: Duration,
}

impl PostingRepository {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>, timeout: Duration) -> Self {
        Self {
            store,
            collection: collection.into(),
            timeout,
        }
    }

    pub fn from_config(store: Arc<dyn DocumentStore>, config: &StoreConfig) -> Self {
        Self::new(
            store,
            config.collection.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Whether a posting with this id is stored.
    pub async fn exists(&self, id: &str) -> Result<bool> {
        self.bounded("exists", self.store.exists(&self.collection, id))
            .await
    }

    /// Persist a posting unless its link was seen before.
    pub async fn save(&self, posting: &Posting) -> Result<SaveOutcome> {
        if !posting.has_usable_link() {
            return Err(AppError::validation(format!(
                "posting '{}' has no usable link",
                posting.title
            )));
        }

        let id = posting_id(&posting.link);
        let outcome = self
            .bounded(
                "create_if_absent",
                self.store.create_if_absent(&self.collection, &id, posting),
            )
            .await?;

        Ok(match outcome {
            CreateOutcome::Created(record) => {
                log::info!("[{}] Saved new posting: {}", posting.source, posting.title);
                SaveOutcome::Created(record)
            }
            CreateOutcome::AlreadyExists => {
                log::debug!("[{}] Already stored: {}", posting.source, posting.title);
                SaveOutcome::Duplicate
            }
        })
    }

    /// Every stored record, oldest first.
    pub async fn list(&self) -> Result<Vec<PostingRecord>> {
        self.bounded("stream_all", self.store.stream_all(&self.collection))
            .await
    }

    async fn bounded<T>(&self, operation: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| AppError::timeout(format!("store {operation}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use crate::storage::MemoryStore;

    fn repository() -> PostingRepository {
        PostingRepository::new(Arc::new(MemoryStore::new()), "notices", Duration::from_secs(5))
    }

    fn posting(link: &str) -> Posting {
        Posting {
            source: Source::Lh,
            number: "1".into(),
            title: "매입임대 공고".into(),
            date: "2026-01-02".into(),
            link: link.into(),
        }
    }

    #[tokio::test]
    async fn test_save_then_duplicate() {
        let repo = repository();
        let p = posting("https://example.org/list?act=view&id=729895");

        let SaveOutcome::Created(record) = repo.save(&p).await.unwrap() else {
            panic!("expected creation");
        };
        assert_eq!(record.id, p.id());
        assert_eq!(record.source, Source::Lh);
        assert!(repo.exists(&p.id()).await.unwrap());

        assert_eq!(repo.save(&p).await.unwrap(), SaveOutcome::Duplicate);
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_placeholder_links() {
        let repo = repository();
        assert!(matches!(
            repo.save(&posting("#")).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            repo.save(&posting("")).await,
            Err(AppError::Validation(_))
        ));
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_saves_create_once() {
        let repo = repository();
        let p = posting("https://example.org/list?id=42");
        let saves = (0..6).map(|_| repo.save(&p));
        let created = futures::future::join_all(saves)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(SaveOutcome::Created(_))))
            .count();
        assert_eq!(created, 1);
    }
}
