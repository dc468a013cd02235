// src/utils/url.rs

//! Link canonicalization.
//!
//! Boards link to detail pages in three ways: a plain `href`, a script
//! action carrying the full detail path (`goView3('729895','/board.es?...')`),
//! or a script action carrying only the article number. [`LinkResolver`]
//! turns any of them into an absolute URL without touching the network.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::Result;

static SCRIPT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4,})").expect("valid script id regex"));

/// Resolve a raw href against the listing page URL.
///
/// Absolute URLs pass through unchanged; root-relative paths join with
/// the page's scheme and host; other paths join relative to the page.
///
/// # Examples
/// ```
/// use notice_push::utils::url::canonicalize;
/// use url::Url;
///
/// let page = Url::parse("https://example.org/board/list.do").unwrap();
/// assert_eq!(
///     canonicalize(&page, "/list?act=view&id=729895").as_deref(),
///     Some("https://example.org/list?act=view&id=729895")
/// );
/// assert_eq!(
///     canonicalize(&page, "view.do?id=7").as_deref(),
///     Some("https://example.org/board/view.do?id=7")
/// );
/// ```
pub fn canonicalize(page_url: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if is_absolute(raw) {
        return Some(raw.to_string());
    }
    page_url.join(raw).ok().map(|u| u.to_string())
}

fn is_absolute(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn is_script(href: &str) -> bool {
    href.trim().to_ascii_lowercase().starts_with("javascript")
}

/// Whether an href points somewhere by itself (not a placeholder or script).
pub fn is_direct_href(href: &str) -> bool {
    let href = href.trim();
    !href.is_empty() && href != "#" && href != "#none" && !is_script(href)
}

/// Extract the detail path embedded in a script action.
pub fn extract_script_path(script: &str, pattern: &Regex) -> Option<String> {
    pattern
        .captures(script)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extract a bare article number (4+ digits) from a script action.
pub fn extract_script_id(script: &str) -> Option<String> {
    SCRIPT_ID
        .captures(script)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Per-source link resolution rules.
#[derive(Debug, Clone)]
pub struct LinkResolver {
    page_url: Url,
    view_path: Regex,
    view_url_template: Option<String>,
}

impl LinkResolver {
    /// Create a resolver for one listing page.
    pub fn new(
        page_url: &str,
        view_path_pattern: &str,
        view_url_template: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            page_url: Url::parse(page_url)?,
            view_path: Regex::new(view_path_pattern)?,
            view_url_template,
        })
    }

    /// Listing page URL relative links are resolved against.
    pub fn page_url(&self) -> &Url {
        &self.page_url
    }

    /// Resolve an anchor's `href` / `onclick` pair.
    ///
    /// Priority: direct href, then a detail path inside the script action,
    /// then an article number substituted into the view template.
    pub fn resolve(&self, href: Option<&str>, onclick: Option<&str>) -> Option<String> {
        if let Some(href) = href.filter(|h| is_direct_href(h)) {
            if let Some(link) = canonicalize(&self.page_url, href) {
                return Some(link);
            }
        }

        let script = onclick
            .filter(|s| !s.trim().is_empty())
            .or_else(|| href.filter(|h| is_script(h)))?;

        if let Some(path) = extract_script_path(script, &self.view_path) {
            return canonicalize(&self.page_url, &path);
        }

        let id = extract_script_id(script)?;
        self.view_url_template
            .as_ref()
            .map(|template| template.replace("{id}", &id))
    }
}
