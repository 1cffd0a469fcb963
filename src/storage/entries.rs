use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{DatabaseError, EntryDbRow, StoredEntry};
use crate::feed::{FeedEntry, Timestamp};

/// Rows per multi-row INSERT; 8 binds each stays well under SQLite's limit.
const BATCH_SIZE: usize = 100;

/// Maximum number of entries returned by a single listing
const MAX_ENTRIES: i64 = 2000;

impl Database {
    // ========================================================================
    // Entry Mutations
    // ========================================================================

    /// Store new entries for a feed, all or nothing.
    ///
    /// Every row gets the same `created_at`. Returns the number of rows
    /// inserted.
    pub async fn create_entries(
        &self,
        feed_id: i64,
        entries: &[FeedEntry],
    ) -> Result<usize, DatabaseError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let created_at = Timestamp::now().to_string();
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        for chunk in entries.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT INTO entries (feed_id, title, content, author, external_url, published_at, created_at, read) ",
            );

            builder.push_values(chunk, |mut b, entry| {
                b.push_bind(feed_id)
                    .push_bind(&entry.title)
                    .push_bind(&entry.content)
                    .push_bind(&entry.author)
                    .push_bind(&entry.external_url)
                    .push_bind(entry.published_at.to_string())
                    .push_bind(&created_at)
                    .push_bind(false);
            });

            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::from_sqlx)?;
        }

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        tracing::debug!(feed_id = feed_id, count = entries.len(), "Entries stored");
        Ok(entries.len())
    }

    /// Mark entry as read (idempotent), returns whether it was changed
    pub async fn mark_entry_read(&self, entry_id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE entries SET read = 1 WHERE id = ? AND read = 0")
            .bind(entry_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark all entries of a feed as read, returns count of entries marked
    pub async fn mark_feed_read(&self, feed_id: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("UPDATE entries SET read = 1 WHERE feed_id = ? AND read = 0")
            .bind(feed_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    /// Mark every entry as read, returns count of entries marked
    pub async fn mark_all_read(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("UPDATE entries SET read = 1 WHERE read = 0")
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    pub async fn delete_entry(&self, entry_id: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM entries WHERE id = ?")
            .bind(entry_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::EntryNotFound(entry_id));
        }
        Ok(())
    }

    // ========================================================================
    // Entry Queries
    // ========================================================================

    /// Entries of one feed, newest first, capped at 2000.
    pub async fn get_feed_entries(
        &self,
        feed_id: i64,
        unread_only: bool,
    ) -> Result<Vec<StoredEntry>, DatabaseError> {
        let rows = sqlx::query_as::<_, EntryDbRow>(
            r#"
            SELECT id, feed_id, title, content, author, external_url,
                   published_at, created_at, read
            FROM entries
            WHERE feed_id = ? AND (? = 0 OR read = 0)
            ORDER BY published_at DESC, id DESC
            LIMIT ?
        "#,
        )
        .bind(feed_id)
        .bind(unread_only)
        .bind(MAX_ENTRIES)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        rows.into_iter().map(EntryDbRow::into_entry).collect()
    }

    pub async fn get_entry(&self, entry_id: i64) -> Result<StoredEntry, DatabaseError> {
        sqlx::query_as::<_, EntryDbRow>(
            r#"
            SELECT id, feed_id, title, content, author, external_url,
                   published_at, created_at, read
            FROM entries
            WHERE id = ?
        "#,
        )
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or(DatabaseError::EntryNotFound(entry_id))?
        .into_entry()
    }
}

#[cfg(test)]
mod tests {
    use crate::feed::{FeedEntry, FeedType, Timestamp};
    use crate::storage::{Database, DatabaseError, NewFeed};
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    async fn seed_feed(db: &Database, id: i64) -> i64 {
        db.create_feed(&NewFeed {
            title: format!("Feed {}", id),
            feed_url: format!("https://feed{}.example.com/rss", id),
            site_url: String::new(),
            feed_type: FeedType::Rss,
            checked_at: "2024-01-01T00:00:00Z".parse().unwrap(),
        })
        .await
        .unwrap()
        .id
    }

    fn test_entry(title: &str, published: &str) -> FeedEntry {
        FeedEntry {
            title: title.to_string(),
            content: format!("<p>{}</p>", title),
            author: Some("Ada".to_string()),
            external_url: format!("https://example.com/{}", title),
            published_at: published.parse::<Timestamp>().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_create_entries_and_list_newest_first() {
        let db = test_db().await;
        let feed_id = seed_feed(&db, 1).await;

        let stored = db
            .create_entries(
                feed_id,
                &[
                    test_entry("older", "2024-01-02T00:00:00Z"),
                    test_entry("newer", "2024-01-03T00:00:00Z"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(stored, 2);

        let entries = db.get_feed_entries(feed_id, false).await.unwrap();
        let titles: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["newer", "older"]);
        assert_eq!(entries[0].feed_id, feed_id);
        assert_eq!(entries[0].author.as_deref(), Some("Ada"));
        assert!(!entries[0].read);
    }

    #[tokio::test]
    async fn test_create_entries_empty_is_noop() {
        let db = test_db().await;
        let feed_id = seed_feed(&db, 1).await;
        assert_eq!(db.create_entries(feed_id, &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_entries_spans_batches() {
        let db = test_db().await;
        let feed_id = seed_feed(&db, 1).await;

        let entries: Vec<FeedEntry> = (0..250)
            .map(|i| test_entry(&format!("e{i}"), "2024-01-02T00:00:00Z"))
            .collect();
        assert_eq!(db.create_entries(feed_id, &entries).await.unwrap(), 250);
        assert_eq!(db.get_feed_entries(feed_id, false).await.unwrap().len(), 250);
    }

    #[tokio::test]
    async fn test_create_entries_for_missing_feed_stores_nothing() {
        let db = test_db().await;
        let result = db
            .create_entries(99, &[test_entry("orphan", "2024-01-02T00:00:00Z")])
            .await;
        assert!(result.is_err());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entries")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let db = test_db().await;
        let feed_id = seed_feed(&db, 1).await;
        db.create_entries(feed_id, &[test_entry("a", "2024-01-02T00:00:00Z")])
            .await
            .unwrap();
        let entry_id = db.get_feed_entries(feed_id, false).await.unwrap()[0].id;

        assert!(db.mark_entry_read(entry_id).await.unwrap());
        assert!(!db.mark_entry_read(entry_id).await.unwrap());
        assert!(db.get_entry(entry_id).await.unwrap().read);
        assert!(db.get_feed_entries(feed_id, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_feed_read_only_touches_that_feed() {
        let db = test_db().await;
        let a = seed_feed(&db, 1).await;
        let b = seed_feed(&db, 2).await;
        db.create_entries(a, &[test_entry("a1", "2024-01-02T00:00:00Z"), test_entry("a2", "2024-01-03T00:00:00Z")])
            .await
            .unwrap();
        db.create_entries(b, &[test_entry("b1", "2024-01-02T00:00:00Z")])
            .await
            .unwrap();

        assert_eq!(db.mark_feed_read(a).await.unwrap(), 2);
        assert_eq!(db.get_feed_entries(b, true).await.unwrap().len(), 1);

        let overview = db.feeds_with_unread_counts().await.unwrap();
        let counts: Vec<(String, i64)> = overview
            .into_iter()
            .map(|o| (o.feed.title, o.unread_count))
            .collect();
        assert_eq!(
            counts,
            vec![("Feed 1".to_string(), 0), ("Feed 2".to_string(), 1)]
        );

        assert_eq!(db.mark_all_read().await.unwrap(), 1);
        assert_eq!(db.mark_all_read().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let db = test_db().await;
        let feed_id = seed_feed(&db, 1).await;
        db.create_entries(feed_id, &[test_entry("a", "2024-01-02T00:00:00Z")])
            .await
            .unwrap();
        let entry_id = db.get_feed_entries(feed_id, false).await.unwrap()[0].id;

        db.delete_entry(entry_id).await.unwrap();
        assert!(matches!(
            db.get_entry(entry_id).await,
            Err(DatabaseError::EntryNotFound(_))
        ));
        assert!(matches!(
            db.delete_entry(entry_id).await,
            Err(DatabaseError::EntryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_feed_cascades_to_entries() {
        let db = test_db().await;
        let feed_id = seed_feed(&db, 1).await;
        db.create_entries(feed_id, &[test_entry("a", "2024-01-02T00:00:00Z")])
            .await
            .unwrap();

        db.delete_feed(feed_id).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entries")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
