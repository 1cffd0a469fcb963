//! harvest: RSS/Atom ingestion with incremental, bounded-concurrency refresh.
//!
//! - [`feed`] resolves, fetches and parses feeds
//! - [`storage`] persists feeds and entries in SQLite
//! - [`subscription`] adds a feed and its current entries
//! - [`refresh`] pulls new entries for every feed concurrently

pub mod config;
pub mod feed;
pub mod refresh;
pub mod storage;
pub mod subscription;

pub use refresh::{refresh_all, refresh_feeds, RefreshError, RefreshResult, RefreshSummary};
pub use subscription::{subscribe, SubscribeError, Subscription};
