use async_trait::async_trait;

use super::schema::Database;
use super::types::{DatabaseError, Feed, NewFeed};
use crate::feed::{FeedEntry, Timestamp};

/// The persistence operations ingestion depends on.
///
/// Refresh workers persist concurrently through one shared store, hence
/// `Send + Sync`.
#[async_trait]
pub trait FeedStore: Send + Sync {
    async fn list_feeds(&self) -> Result<Vec<Feed>, DatabaseError>;

    /// Fails with [`DatabaseError::DuplicateFeedUrl`] if the URL is taken.
    async fn create_feed(&self, feed: &NewFeed) -> Result<Feed, DatabaseError>;

    /// Stores all of `entries` or none of them.
    async fn create_entries(
        &self,
        feed_id: i64,
        entries: &[FeedEntry],
    ) -> Result<usize, DatabaseError>;

    async fn update_feed_checked_at(
        &self,
        feed_id: i64,
        checked_at: Timestamp,
    ) -> Result<(), DatabaseError>;
}

#[async_trait]
impl FeedStore for Database {
    async fn list_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        Database::list_feeds(self).await
    }

    async fn create_feed(&self, feed: &NewFeed) -> Result<Feed, DatabaseError> {
        Database::create_feed(self, feed).await
    }

    async fn create_entries(
        &self,
        feed_id: i64,
        entries: &[FeedEntry],
    ) -> Result<usize, DatabaseError> {
        Database::create_entries(self, feed_id, entries).await
    }

    async fn update_feed_checked_at(
        &self,
        feed_id: i64,
        checked_at: Timestamp,
    ) -> Result<(), DatabaseError> {
        Database::update_feed_checked_at(self, feed_id, checked_at).await
    }
}
