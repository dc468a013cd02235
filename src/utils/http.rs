// src/utils/http.rs

//! HTTP client utilities.

use std::sync::LazyLock;
use std::time::Duration;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use regex::Regex;
use reqwest::header::CONTENT_TYPE;

use crate::error::Result;
use crate::models::CrawlerConfig;

/// Bytes inspected for a `<meta charset>` declaration.
const SNIFF_LIMIT: usize = 2048;

static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([a-z0-9_:.\-]+)"#)
        .expect("valid meta charset regex")
});

/// Create a configured asynchronous HTTP client.
pub fn create_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Fetch a listing page and decode it to text.
///
/// Non-success statuses are returned as errors.
pub async fn fetch_document(
    client: &reqwest::Client,
    url: &str,
    fallback_encoding: &str,
) -> Result<String> {
    let response = client.get(url).send().await?.error_for_status()?;
    let header_charset = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(charset_from_content_type);
    let bytes = response.bytes().await?;

    let encoding = detect_encoding(&bytes, header_charset.as_deref(), fallback_encoding);
    log::debug!("Decoding {} ({} bytes) as {}", url, bytes.len(), encoding.name());
    Ok(decode_with(&bytes, encoding))
}

/// Decode raw HTML bytes, detecting the charset the way [`fetch_document`] does.
pub fn decode_html(bytes: &[u8], header_charset: Option<&str>, fallback_encoding: &str) -> String {
    decode_with(bytes, detect_encoding(bytes, header_charset, fallback_encoding))
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        log::debug!("Malformed {} sequences replaced while decoding", encoding.name());
    }
    text.into_owned()
}

/// Choose an encoding for a listing page.
///
/// Order: BOM, UTF-8 if valid, the document's own `<meta>` charset, then the
/// `Content-Type` charset. A header charset is only trusted when it is not a
/// Latin-1 family label and decodes the bytes cleanly, since boards often
/// mislabel EUC-KR as ISO-8859-1. Undeclared or rejected pages use the
/// fallback if it decodes cleanly, otherwise a content-based guess.
pub fn detect_encoding(
    bytes: &[u8],
    header_charset: Option<&str>,
    fallback_encoding: &str,
) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }
    if std::str::from_utf8(bytes).is_ok() {
        return UTF_8;
    }
    if let Some(encoding) = sniff_meta_charset(bytes).and_then(|l| Encoding::for_label(l.as_bytes()))
    {
        return encoding;
    }
    if let Some(encoding) = header_charset.and_then(|l| Encoding::for_label(l.as_bytes())) {
        if encoding != WINDOWS_1252 && decodes_cleanly(encoding, bytes) {
            return encoding;
        }
        log::debug!("Ignoring Content-Type charset {}", encoding.name());
    }

    if let Some(fallback) = Encoding::for_label(fallback_encoding.as_bytes()) {
        if decodes_cleanly(fallback, bytes) {
            return fallback;
        }
    }
    guess_encoding(bytes)
}

fn decodes_cleanly(encoding: &'static Encoding, bytes: &[u8]) -> bool {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .is_some()
}

fn guess_encoding(bytes: &[u8]) -> &'static Encoding {
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

fn sniff_meta_charset(bytes: &[u8]) -> Option<String> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(SNIFF_LIMIT)]);
    META_CHARSET
        .captures(&head)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
    })
}
