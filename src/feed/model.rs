use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::error::FeedError;

/// Canonical on-disk and on-screen timestamp layout.
///
/// Fixed width and always UTC, so lexical order of the strings equals
/// chronological order.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

// ============================================================================
// Timestamp
// ============================================================================

/// A UTC instant at second precision, rendered in [`CANONICAL_FORMAT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.trunc_subsecs(0))
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CANONICAL_FORMAT))
    }
}

impl FromStr for Timestamp {
    type Err = FeedError;

    /// Parses any accepted source format, canonical strings included.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        super::date::normalize(s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Feed Type
// ============================================================================

/// The closed set of supported syndication formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedType {
    Rss,
    Atom,
}

impl FeedType {
    /// Maps a document's root element local name to a format.
    pub fn from_root(tag: &str) -> Result<Self, FeedError> {
        match tag {
            "rss" => Ok(FeedType::Rss),
            "feed" => Ok(FeedType::Atom),
            other => Err(FeedError::UnsupportedFeedType(other.to_owned())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedType::Rss => "rss",
            FeedType::Atom => "atom",
        }
    }
}

impl fmt::Display for FeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedType {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rss" => Ok(FeedType::Rss),
            "atom" => Ok(FeedType::Atom),
            other => Err(FeedError::UnsupportedFeedType(other.to_owned())),
        }
    }
}

// ============================================================================
// Parsed Data
// ============================================================================

/// One syndicated item projected into the unified model.
///
/// Identity, feed ownership and ingestion time are assigned by storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedEntry {
    pub title: String,
    /// Best-effort body or description, possibly empty
    pub content: String,
    pub author: Option<String>,
    pub external_url: String,
    pub published_at: Timestamp,
}

/// A whole document projected into the unified model, before persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedFeed {
    pub feed_type: FeedType,
    pub title: String,
    pub feed_url: String,
    pub site_url: String,
    /// Entries in document order
    pub entries: Vec<FeedEntry>,
    /// Entries dropped because their date could not be normalized
    #[serde(skip)]
    pub skipped: usize,
}

/// A `<link>` element as seen by the Atom parser or HTML discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Link {
    pub href: String,
    pub rel: Option<String>,
    pub media_type: Option<String>,
}

impl Link {
    pub fn is_self(&self) -> bool {
        self.rel.as_deref() == Some("self")
    }

    pub fn is_alternate(&self) -> bool {
        matches!(self.rel.as_deref(), None | Some("alternate"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_display_is_canonical() {
        let ts = Timestamp::from_datetime(Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap());
        assert_eq!(ts.to_string(), "2024-03-09T07:05:01Z");
    }

    #[test]
    fn test_timestamp_drops_subseconds() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
            + chrono::Duration::milliseconds(750);
        let ts = Timestamp::from_datetime(dt);
        assert_eq!(ts.to_string(), "2024-03-09T07:05:01Z");
        assert_eq!(ts.to_string().parse::<Timestamp>().unwrap(), ts);
    }

    #[test]
    fn test_timestamp_order_matches_string_order() {
        let a: Timestamp = "2023-12-31T23:59:59Z".parse().unwrap();
        let b: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        assert!(a < b);
        assert!(a.to_string() < b.to_string());
    }

    #[test]
    fn test_timestamp_serde_as_string() {
        let ts: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2024-01-01T00:00:00Z\"");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn test_feed_type_from_root() {
        assert_eq!(FeedType::from_root("rss").unwrap(), FeedType::Rss);
        assert_eq!(FeedType::from_root("feed").unwrap(), FeedType::Atom);
        assert!(matches!(
            FeedType::from_root("html"),
            Err(FeedError::UnsupportedFeedType(tag)) if tag == "html"
        ));
    }

    #[test]
    fn test_feed_type_string_roundtrip() {
        for ty in [FeedType::Rss, FeedType::Atom] {
            assert_eq!(ty.as_str().parse::<FeedType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_link_rel_classification() {
        let self_link = Link {
            href: "https://example.com/feed".into(),
            rel: Some("self".into()),
            media_type: None,
        };
        let bare = Link {
            href: "https://example.com/".into(),
            ..Link::default()
        };
        assert!(self_link.is_self());
        assert!(!self_link.is_alternate());
        assert!(bare.is_alternate());
    }
}
