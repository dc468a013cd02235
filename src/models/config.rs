//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Source;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Text preprocessing settings
    #[serde(default)]
    pub cleaning: CleaningConfig,

    /// Document store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Push notification settings
    #[serde(default)]
    pub push: PushConfig,

    /// Announcement sources, one adapter each
    #[serde(default = "defaults::default_sources")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Sources that should take part in a run.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Look up the configuration of a single source.
    pub fn source(&self, source: Source) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.source == source)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if encoding_rs::Encoding::for_label(self.crawler.fallback_encoding.as_bytes()).is_none() {
            return Err(AppError::validation(format!(
                "crawler.fallback_encoding '{}' is not a known encoding",
                self.crawler.fallback_encoding
            )));
        }
        if self.store.timeout_secs == 0 {
            return Err(AppError::validation("store.timeout_secs must be > 0"));
        }
        if self.store.collection.trim().is_empty() {
            return Err(AppError::validation("store.collection is empty"));
        }
        if self.push.topic.trim().is_empty() {
            return Err(AppError::validation("push.topic is empty"));
        }
        if self.push.timeout_secs == 0 {
            return Err(AppError::validation("push.timeout_secs must be > 0"));
        }
        if self.sources.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.source) {
                return Err(AppError::validation(format!(
                    "Source {} is defined more than once",
                    source.source
                )));
            }
            source.validate()?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            cleaning: CleaningConfig::default(),
            store: StoreConfig::default(),
            push: PushConfig::default(),
            sources: defaults::default_sources(),
        }
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum number of sources fetched at once
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Encoding assumed when neither headers nor markup declare one
    /// and the body is not valid UTF-8
    #[serde(default = "defaults::fallback_encoding")]
    pub fallback_encoding: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            fallback_encoding: defaults::fallback_encoding(),
        }
    }
}

/// Text cleaning/preprocessing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningConfig {
    /// Badge markers to remove from titles
    #[serde(default = "defaults::title_remove_patterns")]
    pub title_remove_patterns: Vec<String>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            title_remove_patterns: defaults::title_remove_patterns(),
        }
    }
}

impl CleaningConfig {
    /// Clean a title string.
    pub fn clean_title(&self, text: &str) -> String {
        crate::utils::text::clean_title(text, &self.title_remove_patterns)
    }
}

/// Which document store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// One JSON file per record under the storage directory
    #[default]
    Local,
    /// One object per record in an S3 bucket
    S3,
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Directory (relative to the storage dir) holding local records
    #[serde(default = "defaults::records_dir")]
    pub records_dir: String,

    /// Collection postings are written to
    #[serde(default = "defaults::collection")]
    pub collection: String,

    /// Per-operation timeout in seconds
    #[serde(default = "defaults::store_timeout")]
    pub timeout_secs: u64,

    /// S3 bucket (S3 backend only)
    #[serde(default)]
    pub s3_bucket: Option<String>,

    /// Key prefix inside the bucket (S3 backend only)
    #[serde(default = "defaults::s3_prefix")]
    pub s3_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            records_dir: defaults::records_dir(),
            collection: defaults::collection(),
            timeout_secs: defaults::store_timeout(),
            s3_bucket: None,
            s3_prefix: defaults::s3_prefix(),
        }
    }
}

/// Push notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Disable to log messages instead of sending them
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Topic every notification is published to
    #[serde(default = "defaults::topic")]
    pub topic: String,

    /// Android notification channel
    #[serde(default = "defaults::android_channel_id")]
    pub android_channel_id: String,

    /// Click action understood by the mobile client
    #[serde(default = "defaults::click_action")]
    pub click_action: String,

    /// FCM project id; read from the credentials file when unset
    #[serde(default)]
    pub project_id: Option<String>,

    /// Service-account JSON, relative to the storage dir
    #[serde(default = "defaults::credentials_path")]
    pub credentials_path: String,

    /// Environment variable holding the OAuth access token
    #[serde(default = "defaults::access_token_env")]
    pub access_token_env: String,

    /// Per-send timeout in seconds
    #[serde(default = "defaults::push_timeout")]
    pub timeout_secs: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            topic: defaults::topic(),
            android_channel_id: defaults::android_channel_id(),
            click_action: defaults::click_action(),
            project_id: None,
            credentials_path: defaults::credentials_path(),
            access_token_env: defaults::access_token_env(),
            timeout_secs: defaults::push_timeout(),
        }
    }
}

/// How postings are located on a listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Every row of a dedicated board table is a posting
    #[default]
    Table,
    /// Anchors on a shared page whose text matches a keyword
    Keyword,
}

/// Per-source adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub source: Source,

    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub kind: SourceKind,

    /// Listing page URL; relative links resolve against it
    pub list_url: String,

    /// CSS selector for posting rows
    #[serde(default = "defaults::row_selector")]
    pub row_selector: String,

    /// CSS selector for candidate anchors (keyword sources)
    #[serde(default = "defaults::anchor_selector")]
    pub anchor_selector: String,

    /// Rows with fewer cells are skipped
    #[serde(default = "defaults::min_cells")]
    pub min_cells: usize,

    /// Preferred date cell; negative values count from the end
    #[serde(default = "defaults::date_column")]
    pub date_column: i64,

    /// Regex whose first group captures a detail path inside a script action
    #[serde(default = "defaults::view_path_pattern")]
    pub view_path_pattern: String,

    /// Detail URL with an `{id}` placeholder, used when only a numeric id
    /// can be recovered from a script action
    #[serde(default)]
    pub view_url_template: Option<String>,

    /// Title keywords (keyword sources)
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl SourceConfig {
    /// Validate the source's selectors, patterns, and URLs.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.list_url)?;
        Regex::new(&self.view_path_pattern)?;
        Selector::parse(&self.row_selector)
            .map_err(|e| AppError::selector(&self.row_selector, format!("{e:?}")))?;
        Selector::parse(&self.anchor_selector)
            .map_err(|e| AppError::selector(&self.anchor_selector, format!("{e:?}")))?;

        if let Some(template) = &self.view_url_template {
            if !template.contains("{id}") {
                return Err(AppError::validation(format!(
                    "{}: view_url_template must contain {{id}}",
                    self.source
                )));
            }
        }
        if self.kind == SourceKind::Table && self.min_cells == 0 {
            return Err(AppError::validation(format!(
                "{}: min_cells must be > 0",
                self.source
            )));
        }
        if self.kind == SourceKind::Keyword && self.keywords.is_empty() {
            return Err(AppError::validation(format!(
                "{}: keyword source has no keywords",
                self.source
            )));
        }
        Ok(())
    }
}

mod defaults {
    use super::{SourceConfig, SourceKind};
    use crate::models::Source;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
            .into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn fallback_encoding() -> String {
        "euc-kr".into()
    }

    // Cleaning defaults
    pub fn title_remove_patterns() -> Vec<String> {
        vec!["새글".into()]
    }

    // Store defaults
    pub fn records_dir() -> String {
        "records".into()
    }
    pub fn collection() -> String {
        "notices".into()
    }
    pub fn store_timeout() -> u64 {
        10
    }
    pub fn s3_prefix() -> String {
        "notice-push".into()
    }

    // Push defaults
    pub fn enabled() -> bool {
        true
    }
    pub fn topic() -> String {
        "lh_notice".into()
    }
    pub fn android_channel_id() -> String {
        "lh_notice_channel".into()
    }
    pub fn click_action() -> String {
        "FLUTTER_NOTIFICATION_CLICK".into()
    }
    pub fn credentials_path() -> String {
        "serviceAccountKey.json".into()
    }
    pub fn access_token_env() -> String {
        "FCM_ACCESS_TOKEN".into()
    }
    pub fn push_timeout() -> u64 {
        10
    }

    // Source defaults
    pub fn row_selector() -> String {
        "table tbody tr".into()
    }
    pub fn anchor_selector() -> String {
        "a".into()
    }
    pub fn min_cells() -> usize {
        3
    }
    pub fn date_column() -> i64 {
        -2
    }
    pub fn view_path_pattern() -> String {
        r#"['"](/[^'"]*\?[^'"]+)['"]"#.into()
    }

    pub fn default_sources() -> Vec<SourceConfig> {
        const SEOUL_NOTICES: &str = "https://www.seoul.go.kr/news/news_notice.do";

        vec![
            SourceConfig {
                source: Source::Lh,
                enabled: true,
                kind: SourceKind::Table,
                list_url: "https://www.lh.or.kr/board.es?mid=a10601020000&bid=0034".into(),
                row_selector: row_selector(),
                anchor_selector: anchor_selector(),
                min_cells: min_cells(),
                date_column: date_column(),
                view_path_pattern: r#"['"](/board\.es\?[^'"]+)['"]"#.into(),
                view_url_template: Some(
                    "https://www.lh.or.kr/board.es?mid=a10601020000&bid=0034\
                     &act=view&list_no={id}&tag=&nPage=1"
                        .into(),
                ),
                keywords: Vec::new(),
            },
            SourceConfig {
                source: Source::Kams,
                enabled: true,
                kind: SourceKind::Table,
                list_url: "https://www.gokams.or.kr/01_news/notice.asp".into(),
                row_selector: row_selector(),
                anchor_selector: anchor_selector(),
                min_cells: min_cells(),
                date_column: date_column(),
                view_path_pattern: view_path_pattern(),
                view_url_template: Some(
                    "https://www.gokams.or.kr/01_news/notice_view.asp?idx={id}".into(),
                ),
                keywords: Vec::new(),
            },
            SourceConfig {
                source: Source::Seoul,
                enabled: true,
                kind: SourceKind::Table,
                list_url: SEOUL_NOTICES.into(),
                row_selector: row_selector(),
                anchor_selector: anchor_selector(),
                min_cells: min_cells(),
                date_column: date_column(),
                view_path_pattern: view_path_pattern(),
                view_url_template: Some(format!("{SEOUL_NOTICES}?bbsNo=277&nttNo={{id}}")),
                keywords: Vec::new(),
            },
            SourceConfig {
                source: Source::SeoulPublicArt,
                enabled: true,
                kind: SourceKind::Keyword,
                list_url: SEOUL_NOTICES.into(),
                row_selector: row_selector(),
                anchor_selector: "table tbody tr a".into(),
                min_cells: min_cells(),
                date_column: date_column(),
                view_path_pattern: view_path_pattern(),
                view_url_template: Some(format!("{SEOUL_NOTICES}?bbsNo=277&nttNo={{id}}")),
                keywords: vec!["공공미술".into(), "공공 미술".into()],
            },
        ]
    }
}
