//! Adapter for boards where every table row is a posting.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{CleaningConfig, Posting, Source, SourceConfig};
use crate::services::adapter::{PageContext, SourceAdapter, element_text, parse_selector};
use crate::utils::text::pick_date;

/// Row-per-posting board adapter.
///
/// Rows with fewer than `min_cells` cells (headers, notices-of-notices) and
/// rows without an anchor are skipped. The first cell is the number, the
/// first anchor the title and link.
pub struct TableAdapter {
    page: PageContext,
    row_sel: Selector,
    anchor_sel: Selector,
    cell_sel: Selector,
    min_cells: usize,
    date_column: i64,
}

impl TableAdapter {
    pub fn new(
        config: &SourceConfig,
        cleaning: &CleaningConfig,
        client: reqwest::Client,
        fallback_encoding: &str,
    ) -> Result<Self> {
        Ok(Self {
            page: PageContext::new(config, cleaning, client, fallback_encoding)?,
            row_sel: parse_selector(&config.row_selector)?,
            anchor_sel: parse_selector(&config.anchor_selector)?,
            cell_sel: parse_selector("td, th")?,
            min_cells: config.min_cells,
            date_column: config.date_column,
        })
    }

    fn parse_row(&self, row: &ElementRef) -> Result<Option<Posting>> {
        let cells: Vec<String> = row.select(&self.cell_sel).map(|c| element_text(&c)).collect();
        if cells.len() < self.min_cells {
            return Ok(None);
        }

        let Some(anchor) = row.select(&self.anchor_sel).next() else {
            return Ok(None);
        };

        let number = cells.first().cloned().unwrap_or_default();
        let title = self.page.anchor_title(&anchor);
        if title.is_empty() {
            return Err(AppError::parse(format!(
                "row {number:?} has an anchor without a title"
            )));
        }

        let Some(link) = self.page.anchor_link(&anchor) else {
            log::debug!("[{}] No link recoverable for '{}'", self.page.source, title);
            return Ok(None);
        };

        Ok(Some(Posting {
            source: self.page.source,
            number,
            title,
            date: pick_date(&cells, self.date_column),
            link,
        }))
    }
}

#[async_trait]
impl SourceAdapter for TableAdapter {
    fn source(&self) -> Source {
        self.page.source
    }

    async fn fetch(&self) -> Result<String> {
        self.page.fetch().await
    }

    fn parse(&self, html: &str) -> Vec<Posting> {
        let document = Html::parse_document(html);
        let mut postings = Vec::new();
        let mut rows = 0;

        for row in document.select(&self.row_sel) {
            rows += 1;
            match self.parse_row(&row) {
                Ok(Some(posting)) => postings.push(posting),
                Ok(None) => {}
                Err(e) => log::warn!("[{}] Skipping row: {}", self.page.source, e),
            }
        }

        if rows == 0 {
            log::warn!(
                "[{}] No rows matched at {}; the page layout may have changed",
                self.page.source,
                self.page.list_url
            );
        }
        postings
    }
}
