use futures::StreamExt;
use std::time::Duration;

use super::error::FeedError;

/// Knobs for every outbound request the ingestion engine makes.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Upper bound on each request, probe and discovery included
    pub timeout: Duration,
    /// Retries after 429, 5xx or a short body
    pub max_retries: u32,
    /// First backoff delay; doubled on each retry
    pub retry_base_delay: Duration,
    /// Bodies larger than this fail with [`FeedError::ResponseTooLarge`]
    pub max_body_bytes: usize,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            user_agent: concat!("harvest/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

/// HTTP client wrapper applying [`FetchOptions`] uniformly.
///
/// Cheap to clone: `reqwest::Client` is reference counted.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    options: FetchOptions,
}

impl HttpClient {
    pub fn new(options: FetchOptions) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .user_agent(options.user_agent.clone())
            .build()?;
        Ok(Self { client, options })
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Issues a `HEAD` request and returns the bare media type, if any.
    ///
    /// Parameters such as `charset` are stripped and the result lowercased.
    pub async fn probe_content_type(&self, url: &str) -> Result<Option<String>, FeedError> {
        let response = tokio::time::timeout(self.options.timeout, self.client.head(url).send())
            .await
            .map_err(|_| FeedError::Timeout)?
            .map_err(FeedError::Network)?;

        if !response.status().is_success() {
            return Err(FeedError::HttpStatus(response.status().as_u16()));
        }

        Ok(response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(media_type))
    }

    /// Fetches a document body.
    ///
    /// - 429 and 5xx responses are retried with exponential backoff
    /// - other non-2xx responses fail immediately with [`FeedError::HttpStatus`]
    /// - bodies shorter than their Content-Length are retried
    /// - bodies over `max_body_bytes` fail with [`FeedError::ResponseTooLarge`]
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FeedError> {
        let mut retry_count = 0;

        loop {
            let response =
                tokio::time::timeout(self.options.timeout, self.client.get(url).send())
                    .await
                    .map_err(|_| FeedError::Timeout)?
                    .map_err(FeedError::Network)?;

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if retry_count >= self.options.max_retries {
                    return Err(FeedError::HttpStatus(status.as_u16()));
                }
                let delay = self.backoff(retry_count);
                tracing::warn!(
                    url = %url,
                    status = %status,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Retryable HTTP status, backing off"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                return Err(FeedError::HttpStatus(status.as_u16()));
            }

            match self.read_limited_bytes(response).await {
                Ok(bytes) => return Ok(bytes),
                Err(FeedError::IncompleteResponse { expected, received })
                    if retry_count < self.options.max_retries =>
                {
                    let delay = self.backoff(retry_count);
                    tracing::debug!(
                        url = %url,
                        expected = expected,
                        received = received,
                        attempt = retry_count + 1,
                        "Retrying incomplete download"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn backoff(&self, retry_count: u32) -> Duration {
        self.options
            .retry_base_delay
            .saturating_mul(2u32.saturating_pow(retry_count))
    }

    async fn read_limited_bytes(&self, response: reqwest::Response) -> Result<Vec<u8>, FeedError> {
        let limit = self.options.max_body_bytes;
        let expected_length = response.content_length();

        // Fast path: check Content-Length header
        if let Some(len) = expected_length {
            if len > limit as u64 {
                return Err(FeedError::ResponseTooLarge);
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(FeedError::Network)?;
            if bytes.len().saturating_add(chunk.len()) > limit {
                return Err(FeedError::ResponseTooLarge);
            }
            bytes.extend_from_slice(&chunk);
        }

        if let Some(expected) = expected_length {
            if (bytes.len() as u64) < expected {
                return Err(FeedError::IncompleteResponse {
                    expected,
                    received: bytes.len(),
                });
            }
        }

        Ok(bytes)
    }
}

/// `"Text/HTML; charset=utf-8"` becomes `"text/html"`.
pub(crate) fn media_type(header: &str) -> String {
    header
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
