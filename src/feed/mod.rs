//! Feed ingestion: everything between a URL and a list of entries.
//!
//! - [`date`] normalizes source dates into [`Timestamp`]s
//! - [`detect`] sniffs the root element of a document
//! - [`rss`] and [`atom`] project documents into [`ParsedFeed`]
//! - [`resolver`] turns a user-supplied URL into a feed URL
//! - [`Ingestor`] ties the above to the network
//!
//! Nothing here touches storage; see [`crate::refresh`] and
//! [`crate::subscription`] for the persisting side.

pub mod atom;
pub mod date;
pub mod detect;
mod error;
pub(crate) mod http;
mod ingest;
mod model;
pub mod resolver;
pub mod rss;
mod xml;

pub use error::FeedError;
pub use http::{FetchOptions, HttpClient};
pub use ingest::{entries_newer_than, parse_document, Ingestor};
pub use model::{FeedEntry, FeedType, ParsedFeed, Timestamp, CANONICAL_FORMAT};
