use serde::Serialize;
use thiserror::Error;

use crate::feed::{FeedType, Timestamp};

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another harvest process holds the database lock
    #[error("Another instance of harvest appears to be using the database. Please try again.")]
    InstanceLocked,

    /// A feed with the same `feed_url` is already subscribed
    #[error("Already subscribed to {0}")]
    DuplicateFeedUrl(String),

    #[error("Feed {0} not found")]
    FeedNotFound(i64),

    #[error("Entry {0} not found")]
    EntryNotFound(i64),

    /// A stored row no longer decodes into the domain model
    #[error("Invalid stored row: {0}")]
    InvalidRow(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Classify a sqlx error, singling out lock contention
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A subscribed feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feed {
    pub id: i64,
    pub title: String,
    /// Canonical fetch location, unique across feeds
    pub feed_url: String,
    pub site_url: String,
    pub feed_type: FeedType,
    /// Cutoff for the next refresh
    pub checked_at: Timestamp,
}

/// A feed about to be inserted; `id` is assigned by the database.
#[derive(Debug, Clone)]
pub struct NewFeed {
    pub title: String,
    pub feed_url: String,
    pub site_url: String,
    pub feed_type: FeedType,
    pub checked_at: Timestamp,
}

/// A feed as listed to the user, with its unread entry count.
#[derive(Debug, Clone, Serialize)]
pub struct FeedOverview {
    #[serde(flatten)]
    pub feed: Feed,
    pub unread_count: i64,
}

/// A persisted entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredEntry {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub external_url: String,
    pub published_at: Timestamp,
    /// Local ingestion time
    pub created_at: Timestamp,
    pub read: bool,
}

// ============================================================================
// Row Types
// ============================================================================

/// Internal row type for feed queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedDbRow {
    pub id: i64,
    pub title: String,
    pub feed_url: String,
    pub site_url: String,
    pub feed_type: String,
    pub checked_at: String,
}

impl FeedDbRow {
    pub(crate) fn into_feed(self) -> Result<Feed, DatabaseError> {
        Ok(Feed {
            feed_type: self
                .feed_type
                .parse()
                .map_err(|e| invalid_row("feeds", self.id, e))?,
            checked_at: self
                .checked_at
                .parse()
                .map_err(|e| invalid_row("feeds", self.id, e))?,
            id: self.id,
            title: self.title,
            feed_url: self.feed_url,
            site_url: self.site_url,
        })
    }
}

/// Feed row joined with its unread count
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedOverviewRow {
    #[sqlx(flatten)]
    pub feed: FeedDbRow,
    pub unread_count: i64,
}

/// Internal row type for entry queries
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EntryDbRow {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub external_url: String,
    pub published_at: String,
    pub created_at: String,
    pub read: bool,
}

impl EntryDbRow {
    pub(crate) fn into_entry(self) -> Result<StoredEntry, DatabaseError> {
        Ok(StoredEntry {
            published_at: self
                .published_at
                .parse()
                .map_err(|e| invalid_row("entries", self.id, e))?,
            created_at: self
                .created_at
                .parse()
                .map_err(|e| invalid_row("entries", self.id, e))?,
            id: self.id,
            feed_id: self.feed_id,
            title: self.title,
            content: self.content,
            author: self.author,
            external_url: self.external_url,
            read: self.read,
        })
    }
}

fn invalid_row(table: &str, id: i64, err: impl std::fmt::Display) -> DatabaseError {
    DatabaseError::InvalidRow(format!("{table} row {id}: {err}"))
}
