//! In-memory [`DocumentStore`] for tests and dry runs.
//!
//! Uses `BTreeMap` behind `std::sync::RwLock`; the write lock makes
//! `create_if_absent` atomic.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{Posting, PostingRecord};
use crate::storage::{CreateOutcome, DocumentStore};

type Collection = BTreeMap<String, PostingRecord>;

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map_or(0, |records| records.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

fn poisoned<T>(_: T) -> AppError {
    AppError::store("memory store lock poisoned")
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<PostingRecord>> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        posting: &Posting,
    ) -> Result<CreateOutcome> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let records = collections.entry(collection.to_string()).or_default();
        if records.contains_key(id) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        let record = PostingRecord::new(id, posting, Utc::now());
        records.insert(id.to_string(), record.clone());
        Ok(CreateOutcome::Created(record))
    }

    async fn stream_all(&self, collection: &str) -> Result<Vec<PostingRecord>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let mut records: Vec<PostingRecord> = collections
            .get(collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn delete_batch(&self, collection: &str, limit: usize) -> Result<usize> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let Some(records) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let doomed: Vec<String> = records.keys().take(limit).cloned().collect();
        for id in &doomed {
            records.remove(id);
        }
        Ok(doomed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;

    fn posting(n: usize) -> Posting {
        Posting {
            source: Source::Seoul,
            number: n.to_string(),
            title: format!("공공디자인 공모 {n}"),
            date: "2026-03-01".to_string(),
            link: format!("https://example.org/notice?nttNo={n}"),
        }
    }

    #[tokio::test]
    async fn test_create_is_conditional() {
        let store = MemoryStore::new();
        let p = posting(1);
        assert!(matches!(
            store.create_if_absent("notices", &p.id(), &p).await.unwrap(),
            CreateOutcome::Created(_)
        ));
        assert_eq!(
            store.create_if_absent("notices", &p.id(), &p).await.unwrap(),
            CreateOutcome::AlreadyExists
        );
        assert_eq!(store.len("notices"), 1);
        assert!(store.exists("notices", &p.id()).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_batch_counts() {
        let store = MemoryStore::new();
        for n in 0..4 {
            let p = posting(n);
            store.create_if_absent("notices", &p.id(), &p).await.unwrap();
        }
        assert_eq!(store.delete_batch("notices", 3).await.unwrap(), 3);
        assert_eq!(store.delete_batch("notices", 3).await.unwrap(), 1);
        assert_eq!(store.delete_batch("notices", 3).await.unwrap(), 0);
        assert_eq!(store.delete_batch("missing", 3).await.unwrap(), 0);
        assert!(store.is_empty("notices"));
    }
}
