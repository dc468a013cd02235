//! Log-only push backend.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::Result;
use crate::push::{PushMessage, PushService};

/// Logs each message and reports it as delivered.
#[derive(Debug, Default)]
pub struct LogPush {
    sent: AtomicUsize,
}

impl LogPush {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages "sent" so far.
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PushService for LogPush {
    async fn send(&self, message: &PushMessage) -> Result<String> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        log::info!(
            "[dry-run] topic={} title={} body={} link={}",
            message.topic,
            message.title,
            message.body,
            message.data.get("link").map_or("", String::as_str)
        );
        Ok(format!("dry-run/{n}"))
    }

    fn name(&self) -> &str {
        "log"
    }
}
