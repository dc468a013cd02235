//! AWS S3 document store.
//!
//! One object per record at `{prefix}/{collection}/{id}.json`. Creation
//! uses a conditional `PutObject` with `If-None-Match: *`, so S3 itself
//! rejects a second writer with `412 Precondition Failed`.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{Posting, PostingRecord, StoreConfig};
use crate::storage::{CreateOutcome, DocumentStore, validate_key};

const PRECONDITION_FAILED: u16 = 412;

/// S3-based document store.
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Store {
    /// Create a new S3 store instance.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Create an S3 store from configuration, with `S3_BUCKET` / `S3_PREFIX`
    /// environment overrides.
    pub async fn from_config(config: &StoreConfig) -> Result<Self> {
        let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = Client::new(&aws);

        let bucket = std::env::var("S3_BUCKET")
            .ok()
            .or_else(|| config.s3_bucket.clone())
            .ok_or_else(|| AppError::config("S3 store needs store.s3_bucket or S3_BUCKET"))?;
        let prefix = std::env::var("S3_PREFIX").unwrap_or_else(|_| config.s3_prefix.clone());

        log::info!("Using S3 document store at s3://{}/{}", bucket, prefix);
        Ok(Self::new(client, bucket, prefix))
    }

    fn collection_prefix(&self, collection: &str) -> Result<String> {
        validate_key("collection", collection)?;
        Ok(format!("{}/{}/", self.prefix.trim_end_matches('/'), collection))
    }

    fn record_key(&self, collection: &str, id: &str) -> Result<String> {
        validate_key("id", id)?;
        Ok(format!("{}{}.json", self.collection_prefix(collection)?, id))
    }

    /// List up to `max` record keys (all when `None`).
    async fn list_keys(&self, collection: &str, max: Option<usize>) -> Result<Vec<String>> {
        let prefix = self.collection_prefix(collection)?;
        let mut keys = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .set_continuation_token(token.take());
            if let Some(max) = max {
                let remaining = max.saturating_sub(keys.len()).min(1000);
                request = request.max_keys(remaining as i32);
            }

            let output = request
                .send()
                .await
                .map_err(|e| AppError::S3(DisplayErrorContext(&e).to_string()))?;

            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key())
                    .filter(|key| key.ends_with(".json"))
                    .map(str::to_string),
            );

            let reached_max = max.is_some_and(|max| keys.len() >= max);
            match output.next_continuation_token() {
                Some(next) if output.is_truncated().unwrap_or(false) && !reached_max => {
                    token = Some(next.to_string());
                }
                _ => break,
            }
        }

        if let Some(max) = max {
            keys.truncate(max);
        }
        Ok(keys)
    }

    async fn read_record(&self, key: &str) -> Result<Option<PostingRecord>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::S3(e.to_string()))?;
                Ok(Some(serde_json::from_slice(&bytes.into_bytes())?))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(AppError::S3(DisplayErrorContext(&service_err).to_string()))
                }
            }
        }
    }
}

#[async_trait]
impl DocumentStore for S3Store {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<PostingRecord>> {
        let key = self.record_key(collection, id)?;
        self.read_record(&key).await
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        posting: &Posting,
    ) -> Result<CreateOutcome> {
        let key = self.record_key(collection, id)?;
        let record = PostingRecord::new(id, posting, Utc::now());
        let body = ByteStream::from(serde_json::to_vec_pretty(&record)?);

        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .if_none_match("*")
            .body(body)
            .content_type("application/json")
            .send()
            .await;

        match result {
            Ok(_) => {
                log::debug!("Wrote s3://{}/{}", self.bucket, key);
                Ok(CreateOutcome::Created(record))
            }
            Err(err) => {
                let status = err.raw_response().map(|r| r.status().as_u16());
                if status == Some(PRECONDITION_FAILED) {
                    Ok(CreateOutcome::AlreadyExists)
                } else {
                    Err(AppError::S3(DisplayErrorContext(&err).to_string()))
                }
            }
        }
    }

    async fn stream_all(&self, collection: &str) -> Result<Vec<PostingRecord>> {
        let mut records = Vec::new();
        for key in self.list_keys(collection, None).await? {
            if let Some(record) = self.read_record(&key).await? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn delete_batch(&self, collection: &str, limit: usize) -> Result<usize> {
        if limit == 0 {
            return Ok(0);
        }
        let keys = self.list_keys(collection, Some(limit)).await?;
        for key in &keys {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| AppError::S3(DisplayErrorContext(&e).to_string()))?;
            log::debug!("Deleted s3://{}/{}", self.bucket, key);
        }
        Ok(keys.len())
    }
}
