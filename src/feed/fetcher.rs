use futures::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::config::DEFAULT_USER_AGENT;

/// Feed and page bodies above this size are rejected.
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_FEED_RETRIES: u32 = 2;
const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Errors that can occur while fetching a feed, page or JSON document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after every retry
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    /// Body was not the JSON shape the caller asked for
    #[error("Invalid JSON in response: {0}")]
    Json(#[from] serde_json::Error),
    /// The client could not be built from the given settings
    #[error("Invalid HTTP client configuration: {0}")]
    Config(String),
}

/// Everything needed to build the shared [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    /// Proxy URL applied to both HTTP and HTTPS requests.
    pub proxy: Option<String>,
    /// Per-request timeout. Expiry is reported as [`FetchError::Timeout`].
    pub timeout: Duration,
    /// Retries for top-level feed fetches on 429/5xx. Page fetches never retry.
    pub feed_retries: u32,
    pub max_body_size: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
            timeout: DEFAULT_TIMEOUT,
            feed_retries: DEFAULT_FEED_RETRIES,
            max_body_size: MAX_BODY_SIZE,
        }
    }
}

/// HTTP session shared read-only by every fetch task of a run.
///
/// Sends browser-like default headers so provider sites serve the same
/// markup a desktop browser would get. Cloning is cheap; the connection pool
/// is shared.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    referer: Option<HeaderValue>,
    timeout: Duration,
    feed_retries: u32,
    max_body_size: usize,
}

impl HttpClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        headers.insert("dnt", HeaderValue::from_static("1"));
        headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
        headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
        headers.insert("sec-fetch-site", HeaderValue::from_static("none"));
        headers.insert("sec-fetch-user", HeaderValue::from_static("?1"));
        headers.insert("sec-gpc", HeaderValue::from_static("1"));

        let mut builder = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .default_headers(headers)
            .pool_max_idle_per_host(4)
            .timeout(settings.timeout);

        if let Some(proxy) = settings.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| FetchError::Config(format!("invalid proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let inner = builder
            .build()
            .map_err(|e| FetchError::Config(e.to_string()))?;

        Ok(Self {
            inner,
            referer: None,
            timeout: settings.timeout,
            feed_retries: settings.feed_retries,
            max_body_size: settings.max_body_size,
        })
    }

    /// Returns a client that sends `Referer: referer` with every request.
    pub fn with_referer(mut self, referer: &str) -> Result<Self, FetchError> {
        let value = HeaderValue::from_str(referer)
            .map_err(|_| FetchError::Config(format!("invalid referer: {referer}")))?;
        self.referer = Some(value);
        Ok(self)
    }

    /// Fetches a top-level feed document.
    ///
    /// Rate limiting (429) and server errors (5xx) are retried with
    /// exponential backoff (1s, 2s, 4s, ...) up to the configured retry count.
    /// Other non-2xx statuses fail immediately.
    pub async fn fetch_feed(&self, url: &str) -> Result<String, FetchError> {
        let mut retry_count = 0;

        loop {
            let response = self.send(url, None).await?;
            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if retry_count >= self.feed_retries {
                    return Err(if status.is_server_error() {
                        FetchError::HttpStatus(status.as_u16())
                    } else {
                        FetchError::RateLimited(self.feed_retries)
                    });
                }

                let delay_secs = 1u64 << retry_count;
                tracing::warn!(
                    url = %url,
                    status = %status,
                    retry = retry_count + 1,
                    delay_secs = delay_secs,
                    "Feed request failed, backing off"
                );
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            let body = self.read_text(response).await?;
            tracing::debug!(url = %url, bytes = body.len(), "Fetched feed");
            return Ok(body);
        }
    }

    /// Fetches an article page. A single attempt; failures are for the caller
    /// to turn into an entry drop.
    pub async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let response = self.send(url, None).await?;
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }
        self.read_text(response).await
    }

    /// Fetches and deserializes a JSON document. A single attempt.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let response = self.send(url, Some("application/json")).await?;
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }
        let bytes = read_limited_bytes(response, self.max_body_size).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send(&self, url: &str, accept: Option<&str>) -> Result<reqwest::Response, FetchError> {
        let mut request = self.inner.get(url);
        if let Some(referer) = &self.referer {
            request = request.header(header::REFERER, referer.clone());
        }
        if let Some(accept) = accept {
            request = request.header(header::ACCEPT, accept);
        }

        tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Network(e)
                }
            })
    }

    async fn read_text(&self, response: reqwest::Response) -> Result<String, FetchError> {
        let bytes = read_limited_bytes(response, self.max_body_size).await?;
        String::from_utf8(bytes).map_err(|_| FetchError::InvalidUtf8)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Network(e)
            }
        })?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
