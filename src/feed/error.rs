use thiserror::Error;

/// Errors produced while resolving, fetching, detecting, or parsing a feed.
///
/// `UnrecognizedDateFormat` is entry-level: parsers count and drop the entry
/// rather than failing the whole document with it.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Discovery inspected an HTML page and found no feed `<link>`
    #[error("no feed found for the given URL")]
    FeedNotFound,
    /// The probe returned a content type that is neither HTML nor a feed
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),
    /// The document root element is neither `<rss>` nor `<feed>`
    #[error("unsupported feed type: <{0}>")]
    UnsupportedFeedType(String),
    /// The byte stream could not be tokenized as XML
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    /// No accepted date format matched
    #[error("unrecognized date format: {0:?}")]
    UnrecognizedDateFormat(String),
    /// The URL could not be parsed or does not use http(s)
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,
    /// Response body exceeded the configured size limit
    #[error("response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

impl FeedError {
    pub(crate) fn malformed(err: impl std::fmt::Display) -> Self {
        FeedError::MalformedDocument(err.to_string())
    }
}
