//! Maps a user-supplied URL to the canonical URL of a feed.
//!
//! The URL is probed with `HEAD`. Feed content types are accepted as is;
//! HTML pages are fetched and searched for an advertised feed `<link>`.

use scraper::{Html, Selector};
use url::Url;

use super::error::FeedError;
use super::http::HttpClient;

/// Content types that are taken to be a feed without looking at the body.
const FEED_CONTENT_TYPES: &[&str] = &[
    "text/xml",
    "application/xml",
    "application/rss+xml",
    "application/atom+xml",
];

/// `type` attribute values that mark an HTML `<link>` as a feed.
const FEED_LINK_TYPES: &[&str] = &["application/rss+xml", "application/atom+xml"];

/// Resolves `raw_url` to the URL of the feed it points at.
///
/// # Errors
///
/// - [`FeedError::InvalidUrl`] for unparseable or non-http(s) URLs
/// - [`FeedError::UnsupportedContentType`] when the probe reports neither a
///   feed nor HTML, or no content type at all
/// - [`FeedError::FeedNotFound`] when an HTML page advertises no feed
/// - transport errors from the probe or the page fetch
pub async fn resolve_feed_url(http: &HttpClient, raw_url: &str) -> Result<String, FeedError> {
    let raw_url = raw_url.trim();
    let base = parse_http_url(raw_url)?;

    let content_type = http.probe_content_type(raw_url).await?.unwrap_or_default();
    tracing::debug!(url = %raw_url, content_type = %content_type, "Probed URL");

    if FEED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Ok(raw_url.to_owned());
    }
    if content_type != "text/html" {
        return Err(FeedError::UnsupportedContentType(content_type));
    }

    let body = http.fetch(raw_url).await?;
    let html = String::from_utf8_lossy(&body);
    let feed_url = find_feed_link(&html, &base).ok_or(FeedError::FeedNotFound)?;
    tracing::info!(page = %raw_url, feed_url = %feed_url, "Discovered feed link");
    Ok(feed_url)
}

fn parse_http_url(raw_url: &str) -> Result<Url, FeedError> {
    let url = Url::parse(raw_url).map_err(|e| FeedError::InvalidUrl(format!("{raw_url}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(FeedError::InvalidUrl(format!(
            "{raw_url}: unsupported scheme {scheme:?}"
        ))),
    }
}

/// Returns the first feed `<link>` of `html` in document order.
///
/// Relative hrefs are resolved against `base`; absolute ones are returned
/// untouched.
fn find_feed_link(html: &str, base: &Url) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("link").ok()?;

    document
        .select(&selector)
        .filter(|link| {
            link.value().attr("type").is_some_and(|t| {
                let t = t.trim();
                FEED_LINK_TYPES.iter().any(|ft| ft.eq_ignore_ascii_case(t))
            })
        })
        .find_map(|link| {
            let href = link.value().attr("href")?.trim();
            if href.is_empty() {
                return None;
            }
            if Url::parse(href).is_ok() {
                return Some(href.to_owned());
            }
            base.join(href).ok().map(String::from)
        })
}
