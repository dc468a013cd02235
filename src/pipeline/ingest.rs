//! One ingestion pass over every configured source.
//!
//! ```text
//! adapter.extract() ─► for each posting: repository.save()
//!                                          │
//!                                          └─ Created ─► notifier.notify()
//! ```
//!
//! Sources run concurrently, bounded by `max_concurrent`. A failing source
//! is recorded in its report and never stops the others.

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::models::{Posting, RunReport, SourceReport};
use crate::services::{Notifier, PostingRepository, SaveOutcome, SourceAdapter};

/// Drives adapters through dedup, persistence and notification.
pub struct Ingestor {
    repository: PostingRepository,
    notifier: Notifier,
    max_concurrent: usize,
}

impl Ingestor {
    pub fn new(repository: PostingRepository, notifier: Notifier, max_concurrent: usize) -> Self {
        Self {
            repository,
            notifier,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Run every adapter once.
    pub async fn run(&self, adapters: &[Box<dyn SourceAdapter>]) -> RunReport {
        let started_at = Utc::now();
        log::info!("Starting ingestion for {} source(s)", adapters.len());

        let mut sources: Vec<SourceReport> = stream::iter(adapters)
            .map(|adapter| self.run_source(adapter.as_ref()))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        sources.sort_by_key(|r| r.source);

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            sources,
        };
        log_summary(&report);
        report
    }

    /// Run a single adapter; fetch errors become a failed report.
    pub async fn run_source(&self, adapter: &dyn SourceAdapter) -> SourceReport {
        let source = adapter.source();
        let postings = match adapter.extract().await {
            Ok(postings) => postings,
            Err(e) => {
                log::error!("[{}] Source failed: {}", source, e);
                return SourceReport::failed(source, e.to_string());
            }
        };

        log::info!("[{}] {} candidate(s)", source, postings.len());
        let mut report = SourceReport::new(source);
        report.candidates = postings.len();
        for posting in &postings {
            self.ingest_posting(posting, &mut report).await;
        }
        report
    }

    async fn ingest_posting(&self, posting: &Posting, report: &mut SourceReport) {
        match self.repository.save(posting).await {
            Ok(SaveOutcome::Created(record)) => {
                report.created += 1;
                if self.notifier.notify(&record).await {
                    report.notified += 1;
                } else {
                    report.notify_failures += 1;
                }
            }
            Ok(SaveOutcome::Duplicate) => report.duplicates += 1,
            Err(e) => {
                report.store_failures += 1;
                log::warn!("[{}] Could not save '{}': {}", posting.source, posting.title, e);
            }
        }
    }
}

fn log_summary(report: &RunReport) {
    for source in &report.sources {
        if source.is_failed() {
            log::warn!("[{}] failed: {:?}", source.source, source.status);
        } else {
            log::info!(
                "[{}] candidates={} created={} duplicates={} notified={} notify_failures={} store_failures={}",
                source.source,
                source.candidates,
                source.created,
                source.duplicates,
                source.notified,
                source.notify_failures,
                source.store_failures
            );
        }
    }
    log::info!(
        "Ingestion finished: {} created, {} duplicate(s), {} notified, {} failed source(s)",
        report.total_created(),
        report.total_duplicates(),
        report.total_notified(),
        report.failed_sources()
    );
}
