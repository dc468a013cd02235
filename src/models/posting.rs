//! Posting data structures.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Date value used when no `YYYY[.-]MM[.-]DD` pattern is found in a row.
pub const NO_DATE: &str = "no date";

/// Announcement source a posting was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    /// LH corporation tender board
    #[serde(rename = "LH")]
    Lh,
    /// Korea Arts Management Service notices
    #[serde(rename = "KAMS")]
    Kams,
    /// Seoul public design notices
    Seoul,
    /// Seoul listing filtered down to public-art calls
    SeoulPublicArt,
}

impl Source {
    pub const ALL: [Source; 4] = [
        Source::Lh,
        Source::Kams,
        Source::Seoul,
        Source::SeoulPublicArt,
    ];

    /// Wire tag carried in stored records and push payloads.
    pub fn tag(&self) -> &'static str {
        match self {
            Source::Lh => "LH",
            Source::Kams => "KAMS",
            Source::Seoul => "Seoul",
            Source::SeoulPublicArt => "SeoulPublicArt",
        }
    }

    /// Human-readable name shown as the notification title.
    pub fn display_name(&self) -> &'static str {
        match self {
            Source::Lh => "LH 공모 알림",
            Source::Kams => "예술경영지원센터 알림",
            Source::Seoul => "서울 공공디자인 알림",
            Source::SeoulPublicArt => "서울 공공미술 공모 알림",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Source {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Source::ALL
            .into_iter()
            .find(|source| source.tag().eq_ignore_ascii_case(s))
            .ok_or_else(|| AppError::validation(format!("Unknown source '{s}'")))
    }
}

/// A posting candidate extracted from a listing page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Posting {
    /// Adapter that produced this posting
    pub source: Source,

    /// Site-local sequence label (may be empty)
    pub number: String,

    /// Display title with badge markers removed
    pub title: String,

    /// Free-text date, or [`NO_DATE`]
    pub date: String,

    /// Absolute canonical URL
    pub link: String,
}

impl Posting {
    /// Content-addressed identifier of this posting.
    pub fn id(&self) -> String {
        posting_id(&self.link)
    }

    /// Whether the link can identify a stored record.
    pub fn has_usable_link(&self) -> bool {
        let link = self.link.trim();
        !link.is_empty() && link != "#"
    }
}

/// A posting as persisted in the document store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostingRecord {
    pub id: String,
    pub source: Source,
    pub number: String,
    pub title: String,
    pub date: String,
    pub link: String,
    /// Assigned by the store on creation
    pub created_at: DateTime<Utc>,
}

impl PostingRecord {
    /// Build the stored form of a posting under the given key.
    pub fn new(id: impl Into<String>, posting: &Posting, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            source: posting.source,
            number: posting.number.clone(),
            title: posting.title.clone(),
            date: posting.date.clone(),
            link: posting.link.clone(),
            created_at,
        }
    }
}

/// SHA-256 of the link, lowercase hex.
pub fn posting_id(link: &str) -> String {
    hex::encode(Sha256::digest(link.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_posting() -> Posting {
        Posting {
            source: Source::Lh,
            number: "1024".to_string(),
            title: "행복주택 입주자 모집".to_string(),
            date: "2026-01-05".to_string(),
            link: "https://example.org/list?act=view&id=729895".to_string(),
        }
    }

    #[test]
    fn test_posting_id_is_stable() {
        let link = "https://example.org/list?act=view&id=729895";
        assert_eq!(posting_id(link), posting_id(link));
        assert_eq!(posting_id(link).len(), 64);
        assert_eq!(sample_posting().id(), posting_id(link));
    }

    #[test]
    fn test_posting_id_known_value() {
        assert_eq!(
            posting_id("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_posting_id_depends_only_on_link() {
        let mut other = sample_posting();
        other.source = Source::Kams;
        other.title = "different".to_string();
        assert_eq!(other.id(), sample_posting().id());
    }

    #[test]
    fn test_usable_link() {
        let mut posting = sample_posting();
        assert!(posting.has_usable_link());
        posting.link = "#".to_string();
        assert!(!posting.has_usable_link());
        posting.link = "  ".to_string();
        assert!(!posting.has_usable_link());
    }

    #[test]
    fn test_source_tags_round_trip() {
        for source in Source::ALL {
            assert_eq!(source.tag().parse::<Source>().unwrap(), source);
        }
        assert_eq!("lh".parse::<Source>().unwrap(), Source::Lh);
        assert!("unknown".parse::<Source>().is_err());
    }

    #[test]
    fn test_source_serializes_as_tag() {
        let json = serde_json::to_string(&Source::SeoulPublicArt).unwrap();
        assert_eq!(json, "\"SeoulPublicArt\"");
        let json = serde_json::to_string(&Source::Lh).unwrap();
        assert_eq!(json, "\"LH\"");
    }
}
