//! Bulk deletion of a collection.

use crate::error::{AppError, Result};
use crate::storage::DocumentStore;

/// Delete every record in `collection`, `batch_size` at a time.
///
/// Returns the size of each non-empty batch. Stops at the first batch that
/// deletes nothing.
pub async fn purge_collection(
    store: &dyn DocumentStore,
    collection: &str,
    batch_size: usize,
) -> Result<Vec<usize>> {
    if batch_size == 0 {
        return Err(AppError::validation("purge batch size must be > 0"));
    }

    let mut batches = Vec::new();
    loop {
        let deleted = store.delete_batch(collection, batch_size).await?;
        if deleted == 0 {
            break;
        }
        log::info!("Deleted {} record(s) from '{}'", deleted, collection);
        batches.push(deleted);
    }

    log::info!(
        "Purged '{}': {} record(s) in {} batch(es)",
        collection,
        batches.iter().sum::<usize>(),
        batches.len()
    );
    Ok(batches)
}
