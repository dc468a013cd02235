//! Per-run ingestion counters.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Source;

/// How a single source's run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SourceStatus {
    Completed,
    /// Fetch or page-level parse failed; no postings were processed
    Failed(String),
}

/// Counters for one source in one run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: Source,
    #[serde(flatten)]
    pub status: SourceStatus,
    /// Postings the adapter produced
    pub candidates: usize,
    /// Records newly written to the store
    pub created: usize,
    /// Postings already present in the store
    pub duplicates: usize,
    /// Postings whose store write failed
    pub store_failures: usize,
    /// Notifications accepted by the push service
    pub notified: usize,
    /// Notifications that failed after a successful write
    pub notify_failures: usize,
}

impl SourceReport {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            status: SourceStatus::Completed,
            candidates: 0,
            created: 0,
            duplicates: 0,
            store_failures: 0,
            notified: 0,
            notify_failures: 0,
        }
    }

    pub fn failed(source: Source, reason: impl Into<String>) -> Self {
        Self {
            status: SourceStatus::Failed(reason.into()),
            ..Self::new(source)
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, SourceStatus::Failed(_))
    }
}

/// Aggregate result of one ingestion pass.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
}

impl RunReport {
    /// Report for a given source, if it took part in the run.
    pub fn source(&self, source: Source) -> Option<&SourceReport> {
        self.sources.iter().find(|r| r.source == source)
    }

    pub fn total_created(&self) -> usize {
        self.sources.iter().map(|r| r.created).sum()
    }

    pub fn total_duplicates(&self) -> usize {
        self.sources.iter().map(|r| r.duplicates).sum()
    }

    pub fn total_notified(&self) -> usize {
        self.sources.iter().map(|r| r.notified).sum()
    }

    pub fn total_notify_failures(&self) -> usize {
        self.sources.iter().map(|r| r.notify_failures).sum()
    }

    pub fn total_store_failures(&self) -> usize {
        self.sources.iter().map(|r| r.store_failures).sum()
    }

    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|r| r.is_failed()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_sum_across_sources() {
        let mut lh = SourceReport::new(Source::Lh);
        lh.created = 2;
        lh.notified = 1;
        lh.notify_failures = 1;
        let mut kams = SourceReport::new(Source::Kams);
        kams.created = 3;
        kams.notified = 3;
        kams.duplicates = 4;
        let seoul = SourceReport::failed(Source::Seoul, "timeout");

        let now = Utc::now();
        let report = RunReport {
            started_at: now,
            finished_at: now,
            sources: vec![lh, kams, seoul],
        };

        assert_eq!(report.total_created(), 5);
        assert_eq!(report.total_notified(), 4);
        assert_eq!(report.total_notify_failures(), 1);
        assert_eq!(report.total_duplicates(), 4);
        assert_eq!(report.failed_sources(), 1);
        assert!(report.source(Source::Seoul).unwrap().is_failed());
        assert!(report.source(Source::SeoulPublicArt).is_none());
    }

    #[test]
    fn test_failed_status_serializes_reason() {
        let report = SourceReport::failed(Source::Lh, "HTTP 503");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "HTTP 503");
        assert_eq!(json["source"], "LH");
    }

    #[test]
    fn test_completed_status_has_no_reason() {
        let json = serde_json::to_value(SourceReport::new(Source::Kams)).unwrap();
        assert_eq!(json["status"], "completed");
        assert!(json.get("reason").is_none());
        assert_eq!(json["created"], 0);
    }
}
