//! Concurrent incremental refresh of every subscribed feed.
//!
//! A cycle fills a closed task queue with the feeds to refresh, starts a
//! fixed number of workers that drain it, and collects one
//! [`RefreshResult`] per feed on a result channel. The channel closes once
//! the last worker exits, which is the end-of-cycle barrier. Results are
//! persisted one feed at a time as they arrive, in completion order.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

use crate::feed::{FeedEntry, FeedError, Ingestor, Timestamp};
use crate::storage::{DatabaseError, Feed, FeedStore};

/// Outcome of refreshing one feed.
#[derive(Debug)]
pub struct RefreshResult {
    pub feed_id: i64,
    pub feed_title: String,
    /// Entries newer than the feed's cutoff, in document order
    pub outcome: Result<Vec<FeedEntry>, FeedError>,
}

/// Per-cycle counts. Every feed lands in exactly one of the two.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RefreshSummary {
    pub success_count: usize,
    pub error_count: usize,
    /// Entries stored across all successful feeds
    pub new_entries: usize,
}

#[derive(Debug, Error)]
pub enum RefreshError {
    /// The feed list could not be read, so no cycle was started
    #[error("failed to list feeds: {0}")]
    ListFeeds(#[source] DatabaseError),
}

/// Refreshes every feed in `store` with at most `worker_budget` concurrent
/// fetches (a budget of 0 is treated as 1).
///
/// Only a failure to list feeds fails the whole call; per-feed fetch and
/// persistence failures are logged and counted in the summary.
pub async fn refresh_all<S>(
    store: &S,
    ingestor: &Ingestor,
    worker_budget: usize,
) -> Result<RefreshSummary, RefreshError>
where
    S: FeedStore + ?Sized,
{
    let feeds = store.list_feeds().await.map_err(RefreshError::ListFeeds)?;
    Ok(refresh_feeds(store, ingestor, feeds, worker_budget).await)
}

/// Runs one refresh cycle over `feeds`.
pub async fn refresh_feeds<S>(
    store: &S,
    ingestor: &Ingestor,
    feeds: Vec<Feed>,
    worker_budget: usize,
) -> RefreshSummary
where
    S: FeedStore + ?Sized,
{
    let total = feeds.len();
    if total == 0 {
        tracing::debug!("No feeds to refresh");
        return RefreshSummary::default();
    }

    let workers = worker_budget.max(1);
    tracing::info!(feeds = total, workers = workers, "Starting refresh cycle");

    let (mut results, mut pool) = dispatch(feeds, ingestor, workers).await;

    let mut summary = RefreshSummary::default();
    while let Some(result) = results.recv().await {
        match persist(store, result).await {
            Some(stored) => {
                summary.success_count += 1;
                summary.new_entries += stored;
            }
            None => summary.error_count += 1,
        }
    }

    // The channel is closed, so every worker has returned or panicked
    while let Some(joined) = pool.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Refresh worker terminated abnormally");
        }
    }

    // A feed taken by a panicking worker never reports back
    let missing = total - (summary.success_count + summary.error_count);
    if missing > 0 {
        tracing::error!(missing = missing, "Feeds lost to failed workers");
        summary.error_count += missing;
    }

    tracing::info!(
        success = summary.success_count,
        errors = summary.error_count,
        new_entries = summary.new_entries,
        "Refresh cycle complete"
    );
    summary
}

/// Queues `feeds`, closes the queue and starts `workers` tasks draining it.
///
/// Returns the result receiver and the worker set. The workers hold the only
/// result senders.
async fn dispatch(
    feeds: Vec<Feed>,
    ingestor: &Ingestor,
    workers: usize,
) -> (mpsc::Receiver<RefreshResult>, JoinSet<()>) {
    let (task_tx, task_rx) = mpsc::channel::<Feed>(feeds.len());
    let (result_tx, result_rx) = mpsc::channel::<RefreshResult>(feeds.len());

    for feed in feeds {
        // Capacity equals the feed count and the receiver is alive
        if let Err(e) = task_tx.send(feed).await {
            tracing::error!(feed_id = e.0.id, "Task queue closed during dispatch");
        }
    }
    drop(task_tx);

    let tasks = Arc::new(Mutex::new(task_rx));
    let mut pool = JoinSet::new();
    for worker in 0..workers {
        let tasks = Arc::clone(&tasks);
        let results = result_tx.clone();
        let ingestor = ingestor.clone();
        pool.spawn(async move {
            loop {
                let next = tasks.lock().await.recv().await;
                let Some(feed) = next else { break };

                tracing::debug!(worker = worker, feed_id = feed.id, feed_url = %feed.feed_url, "Fetching feed");
                let outcome = ingestor
                    .fetch_new_entries(&feed.feed_url, feed.feed_type, feed.checked_at)
                    .await;

                let result = RefreshResult {
                    feed_id: feed.id,
                    feed_title: feed.title,
                    outcome,
                };
                if results.send(result).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(result_tx);

    (result_rx, pool)
}

/// Stores one result: entries first, then the checkpoint.
///
/// Returns the number of stored entries, or `None` if the fetch or any
/// write failed. A failed entry write leaves the checkpoint untouched so the
/// entries are fetched again next cycle.
async fn persist<S>(store: &S, result: RefreshResult) -> Option<usize>
where
    S: FeedStore + ?Sized,
{
    let RefreshResult {
        feed_id,
        feed_title,
        outcome,
    } = result;

    let entries = match outcome {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(feed_id = feed_id, title = %feed_title, error = %e, "Feed refresh failed");
            return None;
        }
    };

    if !entries.is_empty() {
        if let Err(e) = store.create_entries(feed_id, &entries).await {
            tracing::error!(feed_id = feed_id, title = %feed_title, error = %e, "Failed to store new entries");
            return None;
        }
    }

    if let Err(e) = store.update_feed_checked_at(feed_id, Timestamp::now()).await {
        tracing::error!(feed_id = feed_id, title = %feed_title, error = %e, "Failed to update feed checkpoint");
        return None;
    }

    tracing::debug!(feed_id = feed_id, new_entries = entries.len(), "Feed refreshed");
    Some(entries.len())
}
