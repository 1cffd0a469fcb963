use super::schema::Database;
use super::types::{DatabaseError, Feed, FeedDbRow, FeedOverview, FeedOverviewRow, NewFeed};
use crate::feed::Timestamp;

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// All feeds, in insertion order.
    pub async fn list_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        let rows = sqlx::query_as::<_, FeedDbRow>(
            "SELECT id, title, feed_url, site_url, feed_type, checked_at FROM feeds ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        rows.into_iter().map(FeedDbRow::into_feed).collect()
    }

    /// All feeds with their unread entry counts, ordered by title.
    pub async fn feeds_with_unread_counts(&self) -> Result<Vec<FeedOverview>, DatabaseError> {
        let rows = sqlx::query_as::<_, FeedOverviewRow>(
            r#"
                SELECT
                    f.id, f.title, f.feed_url, f.site_url, f.feed_type, f.checked_at,
                    COUNT(CASE WHEN e.read = 0 THEN 1 END) as unread_count
                FROM feeds f
                LEFT JOIN entries e ON f.id = e.feed_id
                GROUP BY f.id
                ORDER BY f.title COLLATE NOCASE, f.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        rows.into_iter()
            .map(|row| {
                Ok(FeedOverview {
                    feed: row.feed.into_feed()?,
                    unread_count: row.unread_count,
                })
            })
            .collect()
    }

    pub async fn get_feed(&self, feed_id: i64) -> Result<Feed, DatabaseError> {
        sqlx::query_as::<_, FeedDbRow>(
            "SELECT id, title, feed_url, site_url, feed_type, checked_at FROM feeds WHERE id = ?",
        )
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or(DatabaseError::FeedNotFound(feed_id))?
        .into_feed()
    }

    /// Insert a feed, failing with `DuplicateFeedUrl` if its URL is taken.
    pub async fn create_feed(&self, feed: &NewFeed) -> Result<Feed, DatabaseError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feeds (title, feed_url, site_url, feed_type, checked_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(&feed.title)
        .bind(&feed.feed_url)
        .bind(&feed.site_url)
        .bind(feed.feed_type.as_str())
        .bind(feed.checked_at.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                DatabaseError::DuplicateFeedUrl(feed.feed_url.clone())
            }
            e => DatabaseError::from_sqlx(e),
        })?;

        tracing::debug!(feed_id = id, feed_url = %feed.feed_url, "Feed created");
        Ok(Feed {
            id,
            title: feed.title.clone(),
            feed_url: feed.feed_url.clone(),
            site_url: feed.site_url.clone(),
            feed_type: feed.feed_type,
            checked_at: feed.checked_at,
        })
    }

    /// Move the refresh cutoff of a feed.
    pub async fn update_feed_checked_at(
        &self,
        feed_id: i64,
        checked_at: Timestamp,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE feeds SET checked_at = ? WHERE id = ?")
            .bind(checked_at.to_string())
            .bind(feed_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::FeedNotFound(feed_id));
        }
        Ok(())
    }

    /// Delete a feed and, by cascade, all of its entries.
    pub async fn delete_feed(&self, feed_id: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(feed_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::FeedNotFound(feed_id));
        }
        tracing::info!(feed_id = feed_id, "Feed deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::feed::{FeedType, Timestamp};
    use crate::storage::{Database, DatabaseError, NewFeed};
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    fn test_feed(id: i64) -> NewFeed {
        NewFeed {
            title: format!("Test Feed {}", id),
            feed_url: format!("https://feed{}.example.com/rss", id),
            site_url: format!("https://feed{}.example.com/", id),
            feed_type: FeedType::Rss,
            checked_at: ts("2024-01-01T00:00:00Z"),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_feed() {
        let db = test_db().await;
        let created = db.create_feed(&test_feed(1)).await.unwrap();
        assert!(created.id > 0);

        let fetched = db.get_feed(created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.checked_at.to_string(), "2024-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_duplicate_feed_url_rejected() {
        let db = test_db().await;
        db.create_feed(&test_feed(1)).await.unwrap();

        let mut dup = test_feed(1);
        dup.title = "Another title".to_owned();
        let result = db.create_feed(&dup).await;
        assert!(
            matches!(result, Err(DatabaseError::DuplicateFeedUrl(ref url)) if url == "https://feed1.example.com/rss")
        );
        assert_eq!(db.list_feeds().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_feeds_in_insertion_order() {
        let db = test_db().await;
        for i in [3, 1, 2] {
            db.create_feed(&test_feed(i)).await.unwrap();
        }
        let titles: Vec<String> = db
            .list_feeds()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.title)
            .collect();
        assert_eq!(titles, vec!["Test Feed 3", "Test Feed 1", "Test Feed 2"]);
    }

    #[tokio::test]
    async fn test_atom_feed_type_round_trips() {
        let db = test_db().await;
        let mut feed = test_feed(1);
        feed.feed_type = FeedType::Atom;
        let created = db.create_feed(&feed).await.unwrap();
        assert_eq!(db.get_feed(created.id).await.unwrap().feed_type, FeedType::Atom);
    }

    #[tokio::test]
    async fn test_update_checked_at() {
        let db = test_db().await;
        let feed = db.create_feed(&test_feed(1)).await.unwrap();

        db.update_feed_checked_at(feed.id, ts("2024-03-04T05:06:07Z"))
            .await
            .unwrap();
        assert_eq!(
            db.get_feed(feed.id).await.unwrap().checked_at,
            ts("2024-03-04T05:06:07Z")
        );
    }

    #[tokio::test]
    async fn test_update_checked_at_missing_feed() {
        let db = test_db().await;
        let result = db
            .update_feed_checked_at(42, ts("2024-03-04T05:06:07Z"))
            .await;
        assert!(matches!(result, Err(DatabaseError::FeedNotFound(42))));
    }

    #[tokio::test]
    async fn test_get_missing_feed() {
        let db = test_db().await;
        assert!(matches!(
            db.get_feed(7).await,
            Err(DatabaseError::FeedNotFound(7))
        ));
    }

    #[tokio::test]
    async fn test_delete_feed() {
        let db = test_db().await;
        let feed = db.create_feed(&test_feed(1)).await.unwrap();
        db.delete_feed(feed.id).await.unwrap();
        assert!(db.list_feeds().await.unwrap().is_empty());
        assert!(matches!(
            db.delete_feed(feed.id).await,
            Err(DatabaseError::FeedNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unread_counts_with_no_entries() {
        let db = test_db().await;
        db.create_feed(&test_feed(2)).await.unwrap();
        db.create_feed(&test_feed(1)).await.unwrap();

        let overview = db.feeds_with_unread_counts().await.unwrap();
        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].feed.title, "Test Feed 1");
        assert!(overview.iter().all(|o| o.unread_count == 0));
    }
}
