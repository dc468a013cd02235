//! Service layer for the ingestion pipeline.
//!
//! This module contains the business logic for:
//! - Listing extraction (`SourceAdapter`, `TableAdapter`, `KeywordAdapter`)
//! - Deduplicating persistence (`PostingRepository`)
//! - Push formatting and delivery (`Notifier`)

mod adapter;
mod keyword;
mod notifier;
mod repository;
mod table;

pub use adapter::{PageContext, SourceAdapter};
pub use keyword::KeywordAdapter;
pub use notifier::Notifier;
pub use repository::{PostingRepository, SaveOutcome};
pub use table::TableAdapter;

use crate::error::Result;
use crate::models::{Config, SourceConfig, SourceKind};

/// Build the adapter for one source.
pub fn build_adapter(
    config: &Config,
    source: &SourceConfig,
    client: reqwest::Client,
) -> Result<Box<dyn SourceAdapter>> {
    let encoding = &config.crawler.fallback_encoding;
    Ok(match source.kind {
        SourceKind::Table => Box::new(TableAdapter::new(source, &config.cleaning, client, encoding)?),
        SourceKind::Keyword => {
            Box::new(KeywordAdapter::new(source, &config.cleaning, client, encoding)?)
        }
    })
}

/// Build adapters for every enabled source, sharing one HTTP client.
pub fn build_adapters(config: &Config, client: &reqwest::Client) -> Result<Vec<Box<dyn SourceAdapter>>> {
    config
        .enabled_sources()
        .map(|source| build_adapter(config, source, client.clone()))
        .collect()
}
