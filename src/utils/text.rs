//! Shared text normalization for listing rows.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::NO_DATE;

static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}[.-]\d{2}[.-]\d{2}").expect("valid date regex"));

/// Collapse runs of whitespace into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove badge markers from a title and normalize its whitespace.
pub fn clean_title(text: &str, remove_patterns: &[String]) -> String {
    let mut result = text.to_string();
    for pattern in remove_patterns.iter().filter(|p| !p.is_empty()) {
        result = result.replace(pattern.as_str(), "");
    }
    normalize_whitespace(&result)
}

/// Whether the text contains a `YYYY[.-]MM[.-]DD` date.
pub fn contains_date(text: &str) -> bool {
    DATE_PATTERN.is_match(text)
}

/// Pick the date cell of a row.
///
/// `preferred` indexes `cells`, counting from the end when negative. If
/// that cell has no date the first cell that does is used, and
/// [`NO_DATE`] when none do.
pub fn pick_date(cells: &[String], preferred: i64) -> String {
    let len = cells.len() as i64;
    let index = if preferred < 0 { len + preferred } else { preferred };

    if (0..len).contains(&index) {
        let cell = &cells[index as usize];
        if contains_date(cell) {
            return cell.clone();
        }
    }

    cells
        .iter()
        .find(|cell| contains_date(cell))
        .cloned()
        .unwrap_or_else(|| NO_DATE.to_string())
}
