//! Push notification delivery.
//!
//! A [`PushService`] delivers a [`PushMessage`] to a topic and returns the
//! provider's message id. Backends:
//!
//! ```text
//! FcmPush   Firebase Cloud Messaging HTTP v1
//! LogPush   logs the message instead of sending it (dry runs)
//! ```

pub mod fcm;
pub mod dry_run;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::PushConfig;

pub use fcm::FcmPush;
pub use dry_run::LogPush;

/// Android delivery hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AndroidHints {
    pub priority: String,
    pub sound: String,
    pub channel_id: String,
}

impl AndroidHints {
    /// High priority with the default sound on the given channel.
    pub fn high(channel_id: impl Into<String>) -> Self {
        Self {
            priority: "high".to_string(),
            sound: "default".to_string(),
            channel_id: channel_id.into(),
        }
    }
}

/// A notification addressed to a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    pub topic: String,
    pub title: String,
    pub body: String,
    /// String key/value payload delivered to the app
    pub data: BTreeMap<String, String>,
    pub android: AndroidHints,
}

/// Trait for topic-based push delivery backends.
#[async_trait]
pub trait PushService: Send + Sync {
    /// Deliver a message, returning the provider's message id.
    async fn send(&self, message: &PushMessage) -> Result<String>;

    /// Human-readable backend name.
    fn name(&self) -> &str;
}

/// Construct the configured push backend.
///
/// `dry_run` or `push.enabled = false` selects [`LogPush`].
pub fn build_push(
    config: &PushConfig,
    storage_dir: &Path,
    dry_run: bool,
) -> Result<Arc<dyn PushService>> {
    if dry_run || !config.enabled {
        log::info!("Push delivery disabled; messages will only be logged");
        return Ok(Arc::new(LogPush::new()));
    }
    Ok(Arc::new(FcmPush::from_config(config, storage_dir)?))
}
