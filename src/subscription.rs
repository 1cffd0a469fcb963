use thiserror::Error;

use crate::feed::{FeedError, Ingestor, Timestamp};
use crate::storage::{DatabaseError, Feed, FeedStore, NewFeed};

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

/// What a new subscription stored.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Subscription {
    pub feed: Feed,
    pub entries: usize,
}

/// Subscribes to the feed behind `raw_url`.
///
/// Runs full extraction, stores the feed with `checked_at` set to now and
/// then stores every extracted entry, so the next refresh only picks up
/// entries published after this call.
///
/// # Errors
///
/// Extraction errors come back as [`SubscribeError::Feed`]; an already
/// subscribed URL is `SubscribeError::Storage(DatabaseError::DuplicateFeedUrl)`.
pub async fn subscribe<S>(
    store: &S,
    ingestor: &Ingestor,
    raw_url: &str,
) -> Result<Subscription, SubscribeError>
where
    S: FeedStore + ?Sized,
{
    let parsed = ingestor.resolve_and_extract_feed(raw_url).await?;

    let feed = store
        .create_feed(&NewFeed {
            title: parsed.title,
            feed_url: parsed.feed_url,
            site_url: parsed.site_url,
            feed_type: parsed.feed_type,
            checked_at: Timestamp::now(),
        })
        .await?;

    let entries = store.create_entries(feed.id, &parsed.entries).await?;
    tracing::info!(
        feed_id = feed.id,
        feed_url = %feed.feed_url,
        entries = entries,
        "Subscribed to feed"
    );

    Ok(Subscription { feed, entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::http::tests::test_client;
    use crate::feed::FeedType;
    use crate::storage::Database;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Notes</title>
  <link rel="self" href="https://notes.example.com/atom.xml"/>
  <link rel="alternate" href="https://notes.example.com/"/>
  <entry>
    <title>Two</title>
    <link href="https://notes.example.com/2"/>
    <published>2024-01-02T00:00:00Z</published>
  </entry>
  <entry>
    <title>One</title>
    <link href="https://notes.example.com/1"/>
    <published>2024-01-01T00:00:00Z</published>
  </entry>
</feed>"#;

    async fn serve_atom() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/atom.xml"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("Content-Type", "application/atom+xml"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/atom.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ATOM))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_subscribe_stores_feed_and_entries() {
        let server = serve_atom().await;
        let db = Database::open(":memory:").await.unwrap();
        let ingestor = Ingestor::with_http(test_client());

        let before = Timestamp::now();
        let sub = subscribe(&db, &ingestor, &format!("{}/atom.xml", server.uri()))
            .await
            .unwrap();

        assert_eq!(sub.entries, 2);
        assert_eq!(sub.feed.title, "Notes");
        assert_eq!(sub.feed.feed_type, FeedType::Atom);
        // The self link wins over the URL the user typed
        assert_eq!(sub.feed.feed_url, "https://notes.example.com/atom.xml");
        assert_eq!(sub.feed.site_url, "https://notes.example.com/");
        assert!(sub.feed.checked_at >= before);

        let stored = db.get_feed_entries(sub.feed.id, false).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].title, "Two");
    }

    #[tokio::test]
    async fn test_subscribe_twice_is_duplicate() {
        let server = serve_atom().await;
        let db = Database::open(":memory:").await.unwrap();
        let ingestor = Ingestor::with_http(test_client());
        let url = format!("{}/atom.xml", server.uri());

        subscribe(&db, &ingestor, &url).await.unwrap();
        let result = subscribe(&db, &ingestor, &url).await;
        assert!(matches!(
            result,
            Err(SubscribeError::Storage(DatabaseError::DuplicateFeedUrl(_)))
        ));
        assert_eq!(db.list_feeds().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_failure_stores_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).insert_header("Content-Type", "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
            .mount(&server)
            .await;
        let db = Database::open(":memory:").await.unwrap();

        let result = subscribe(&db, &Ingestor::with_http(test_client()), &server.uri()).await;
        assert!(matches!(
            result,
            Err(SubscribeError::Feed(FeedError::FeedNotFound))
        ));
        assert!(db.list_feeds().await.unwrap().is_empty());
    }
}
