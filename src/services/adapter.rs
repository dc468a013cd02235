//! The per-source extraction seam.

use async_trait::async_trait;
use scraper::{ElementRef, Selector};

use crate::error::{AppError, Result};
use crate::models::{CleaningConfig, Posting, Source, SourceConfig};
use crate::utils::LinkResolver;
use crate::utils::http::fetch_document;
use crate::utils::text::normalize_whitespace;

/// Fetches one listing page and turns it into posting candidates.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source tag stamped on every posting.
    fn source(&self) -> Source;

    /// Download the listing page.
    async fn fetch(&self) -> Result<String>;

    /// Extract postings from a listing page.
    fn parse(&self, html: &str) -> Vec<Posting>;

    /// Fetch and parse in one step.
    async fn extract(&self) -> Result<Vec<Posting>> {
        let html = self.fetch().await?;
        Ok(self.parse(&html))
    }
}

/// State shared by the table and keyword adapters.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub source: Source,
    pub list_url: String,
    pub resolver: LinkResolver,
    pub cleaning: CleaningConfig,
    client: reqwest::Client,
    fallback_encoding: String,
}

impl PageContext {
    pub fn new(
        config: &SourceConfig,
        cleaning: &CleaningConfig,
        client: reqwest::Client,
        fallback_encoding: &str,
    ) -> Result<Self> {
        Ok(Self {
            source: config.source,
            list_url: config.list_url.clone(),
            resolver: LinkResolver::new(
                &config.list_url,
                &config.view_path_pattern,
                config.view_url_template.clone(),
            )?,
            cleaning: cleaning.clone(),
            client,
            fallback_encoding: fallback_encoding.to_string(),
        })
    }

    /// GET the listing page, decoding legacy charsets.
    pub async fn fetch(&self) -> Result<String> {
        log::debug!("[{}] Fetching {}", self.source, self.list_url);
        fetch_document(&self.client, &self.list_url, &self.fallback_encoding).await
    }

    /// Resolve an anchor's link from its `href` / `onclick`.
    pub fn anchor_link(&self, anchor: &ElementRef) -> Option<String> {
        let element = anchor.value();
        self.resolver
            .resolve(element.attr("href"), element.attr("onclick"))
    }

    /// Anchor text as a display title.
    pub fn anchor_title(&self, anchor: &ElementRef) -> String {
        self.cleaning.clean_title(&anchor.text().collect::<String>())
    }
}

pub(crate) fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Whitespace-normalized text content of an element.
pub(crate) fn element_text(element: &ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}
