//! Adapter for shared listing pages filtered by title keywords.

use std::collections::HashSet;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::error::Result;
use crate::models::{CleaningConfig, NO_DATE, Posting, Source, SourceConfig};
use crate::services::adapter::{PageContext, SourceAdapter, element_text, parse_selector};
use crate::utils::text::pick_date;

/// Keeps anchors whose text mentions one of the configured keywords.
pub struct KeywordAdapter {
    page: PageContext,
    anchor_sel: Selector,
    cell_sel: Selector,
    keywords: Vec<String>,
    date_column: i64,
}

impl KeywordAdapter {
    pub fn new(
        config: &SourceConfig,
        cleaning: &CleaningConfig,
        client: reqwest::Client,
        fallback_encoding: &str,
    ) -> Result<Self> {
        Ok(Self {
            page: PageContext::new(config, cleaning, client, fallback_encoding)?,
            anchor_sel: parse_selector(&config.anchor_selector)?,
            cell_sel: parse_selector("td, th")?,
            keywords: config
                .keywords
                .iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            date_column: config.date_column,
        })
    }

    fn matches(&self, title: &str) -> bool {
        self.keywords.iter().any(|k| title.contains(k.as_str()))
    }

    /// Number and date from the enclosing `tr` / `li`, if any.
    fn row_fields(&self, anchor: &ElementRef) -> (String, String) {
        let row = anchor
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|e| matches!(e.value().name(), "tr" | "li"));
        let Some(row) = row else {
            return (String::new(), NO_DATE.to_string());
        };

        let mut cells: Vec<String> = row.select(&self.cell_sel).map(|c| element_text(&c)).collect();
        if cells.is_empty() {
            cells = row
                .children()
                .filter_map(ElementRef::wrap)
                .map(|c| element_text(&c))
                .collect();
        }

        let number = if row.value().name() == "tr" {
            cells.first().cloned().unwrap_or_default()
        } else {
            String::new()
        };
        (number, pick_date(&cells, self.date_column))
    }
}

#[async_trait]
impl SourceAdapter for KeywordAdapter {
    fn source(&self) -> Source {
        self.page.source
    }

    async fn fetch(&self) -> Result<String> {
        self.page.fetch().await
    }

    fn parse(&self, html: &str) -> Vec<Posting> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut postings = Vec::new();
        let mut anchors = 0;

        for anchor in document.select(&self.anchor_sel) {
            anchors += 1;
            let title = self.page.anchor_title(&anchor);
            if title.is_empty() || !self.matches(&title) {
                continue;
            }
            let Some(link) = self.page.anchor_link(&anchor) else {
                log::debug!("[{}] No link recoverable for '{}'", self.page.source, title);
                continue;
            };
            if !seen.insert(link.clone()) {
                continue;
            }

            let (number, date) = self.row_fields(&anchor);
            postings.push(Posting {
                source: self.page.source,
                number,
                title,
                date,
                link,
            });
        }

        if anchors == 0 {
            log::warn!(
                "[{}] No anchors matched at {}; the page layout may have changed",
                self.page.source,
                self.page.list_url
            );
        }
        postings
    }
}
