mod entries;
mod feeds;
mod port;
mod schema;
mod types;

pub use port::FeedStore;
pub use schema::Database;
pub use types::{DatabaseError, Feed, FeedOverview, NewFeed, StoredEntry};
