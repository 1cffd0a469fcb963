use super::error::FeedError;
use super::http::{FetchOptions, HttpClient};
use super::model::{FeedEntry, FeedType, ParsedFeed, Timestamp};
use super::{atom, detect, resolver, rss};

/// Entry point for pulling feeds off the network.
///
/// Cloning is cheap; every refresh worker holds its own clone.
#[derive(Debug, Clone)]
pub struct Ingestor {
    http: HttpClient,
}

impl Ingestor {
    pub fn new(options: FetchOptions) -> Result<Self, FeedError> {
        Ok(Self {
            http: HttpClient::new(options)?,
        })
    }

    pub fn with_http(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Resolves `raw_url`, fetches the feed, detects its format and parses it.
    ///
    /// Used at subscription time. Every failure is returned to the caller.
    pub async fn resolve_and_extract_feed(&self, raw_url: &str) -> Result<ParsedFeed, FeedError> {
        let feed_url = resolver::resolve_feed_url(&self.http, raw_url).await?;
        let bytes = self.http.fetch(&feed_url).await?;
        let feed_type = FeedType::from_root(&detect::detect_root(&bytes)?)?;
        let feed = parse_document(&bytes, feed_type, &feed_url)?;

        if feed.skipped > 0 {
            tracing::warn!(
                feed_url = %feed.feed_url,
                skipped = feed.skipped,
                "Dropped entries with unrecognized dates"
            );
        }
        tracing::info!(
            feed_url = %feed.feed_url,
            feed_type = %feed.feed_type,
            entries = feed.entries.len(),
            "Extracted feed"
        );
        Ok(feed)
    }

    /// Fetches a known feed and returns the entries published after `cutoff`.
    ///
    /// The document is parsed as `feed_type` without detection. Entries are
    /// scanned in document order and the scan stops at the first one that is
    /// not newer than `cutoff`, so feeds must list newest entries first;
    /// see [`entries_newer_than`].
    pub async fn fetch_new_entries(
        &self,
        feed_url: &str,
        feed_type: FeedType,
        cutoff: Timestamp,
    ) -> Result<Vec<FeedEntry>, FeedError> {
        let bytes = self.http.fetch(feed_url).await?;
        let feed = parse_document(&bytes, feed_type, feed_url)?;

        if feed.skipped > 0 {
            tracing::debug!(
                feed_url = %feed_url,
                skipped = feed.skipped,
                "Dropped entries with unrecognized dates"
            );
        }

        Ok(entries_newer_than(feed.entries, cutoff))
    }
}

/// Parses `bytes` with the parser for `feed_type`.
pub fn parse_document(
    bytes: &[u8],
    feed_type: FeedType,
    source_url: &str,
) -> Result<ParsedFeed, FeedError> {
    match feed_type {
        FeedType::Rss => rss::parse(bytes, source_url),
        FeedType::Atom => atom::parse(bytes, source_url),
    }
}

/// Keeps the leading run of entries strictly newer than `cutoff`.
///
/// Stops at the first entry at or before the cutoff. A feed that is not
/// sorted newest-first therefore loses any new entries listed after an old
/// one.
pub fn entries_newer_than(entries: Vec<FeedEntry>, cutoff: Timestamp) -> Vec<FeedEntry> {
    entries
        .into_iter()
        .take_while(|entry| entry.published_at > cutoff)
        .collect()
}
