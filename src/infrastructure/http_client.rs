//! HTTP client for polite crawling
//!
//! A rate-limited `reqwest` wrapper behind the `PageFetcher` trait so the
//! connectors and the spec crawler can be driven by fixture pages in tests.
//! Any non-2xx response is an error here; retry policy belongs to callers
//! because it differs between listing pages (page 1 is fatal) and queue rows
//! (bounded backoff).

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::config::HttpConfig;

/// Fetch failure with enough context (url, stage) to diagnose without
/// re-running under extra logging.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("request to {url} cancelled")]
    Cancelled { url: String },

    #[error("giving up on {url} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },
}

impl FetchError {
    pub fn request(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::Request {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn status(status: u16, url: &str) -> Self {
        Self::Status {
            status,
            url: url.to_string(),
        }
    }
}

/// The fetch seam the pipeline depends on: url in, body text out.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page body. `timeout` bounds the whole request; callers that
    /// retry inflate it per attempt.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub accept: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

impl From<&HttpConfig> for HttpClientConfig {
    fn from(config: &HttpConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            accept: config.accept.clone(),
            timeout_seconds: config.timeout_seconds,
            max_requests_per_second: config.max_requests_per_second,
        }
    }
}

/// Rate-limited HTTP client used for every outbound fetch.
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("invalid user agent")?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_str(&config.accept).context("invalid accept header")?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("failed to build HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second.max(1))
                .context("rate limit must be greater than 0")?,
        );

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            config,
        })
    }

    /// Default per-request timeout from configuration.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    async fn fetch_once(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        self.rate_limiter.until_ready().await;
        debug!("HTTP GET {url}");

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|error| FetchError::request(url, error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::status(status.as_u16(), url));
        }

        response
            .text()
            .await
            .map_err(|error| FetchError::request(url, error))
    }

    /// Fetch that aborts promptly when the token fires.
    pub async fn fetch_with_cancellation(
        &self,
        url: &str,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> Result<String, FetchError> {
        if cancellation.is_cancelled() {
            return Err(FetchError::Cancelled {
                url: url.to_string(),
            });
        }
        tokio::select! {
            result = self.fetch_once(url, timeout) => result,
            _ = cancellation.cancelled() => Err(FetchError::Cancelled { url: url.to_string() }),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        self.fetch_once(url, timeout).await
    }
}

/// In-memory fetcher serving canned pages. Used by the test suites and by
/// dry runs; requests are recorded in order for assertions.
#[derive(Default)]
pub struct FixtureFetcher {
    pages: HashMap<String, String>,
    failures: HashMap<String, u16>,
    requests: Mutex<Vec<String>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn with_failure(mut self, url: &str, status: u16) -> Self {
        self.failures.insert(url.to_string(), status);
        self
    }

    /// Every URL requested so far, in order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.requests.lock().expect("request log poisoned").clone()
    }
}

#[async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
        self.requests
            .lock()
            .expect("request log poisoned")
            .push(url.to_string());

        if let Some(status) = self.failures.get(url) {
            return Err(FetchError::status(*status, url));
        }
        match self.pages.get(url) {
            Some(body) => Ok(body.clone()),
            None => Err(FetchError::status(404, url)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation_with_defaults() {
        let client = HttpClient::new(HttpClientConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn fixture_fetcher_serves_and_records() {
        let fetcher = FixtureFetcher::new()
            .with_page("https://example.com/a", "<html>a</html>")
            .with_failure("https://example.com/b", 500);

        let body = fetcher
            .fetch("https://example.com/a", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(body, "<html>a</html>");

        let error = fetcher
            .fetch("https://example.com/b", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(error, FetchError::Status { status: 500, .. }));

        let missing = fetcher
            .fetch("https://example.com/missing", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(missing, FetchError::Status { status: 404, .. }));

        assert_eq!(fetcher.requested_urls().len(), 3);
    }

    #[tokio::test]
    async fn cancelled_token_aborts_fetch() {
        let client = HttpClient::new(HttpClientConfig::default()).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let result = client
            .fetch_with_cancellation("https://example.com", Duration::from_secs(1), &token)
            .await;
        assert!(matches!(result, Err(FetchError::Cancelled { .. })));
    }
}
