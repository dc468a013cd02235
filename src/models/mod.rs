// src/models/mod.rs

//! Domain models for the ingestion pipeline.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod posting;
mod report;

// Re-export all public types
pub use config::{
    CleaningConfig, Config, CrawlerConfig, PushConfig, SourceConfig, SourceKind, StoreBackend,
    StoreConfig,
};
pub use posting::{NO_DATE, Posting, PostingRecord, Source, posting_id};
pub use report::{RunReport, SourceReport, SourceStatus};
