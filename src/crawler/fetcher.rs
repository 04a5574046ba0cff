//! Proxy fetcher implementation
//!
//! This module handles all page requests for the harvester, including:
//! - Building the HTTP client with browser-like headers
//! - Wrapping target URLs in fetch-proxy requests
//! - Retry with increasing backoff for transient failures
//! - Rejecting undersized bodies (blocked or empty pages)

use crate::config::ProxyConfig;
use crate::HarvestError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Result of a single logical fetch
///
/// Failure is signalled through `ok`, never through an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFetchResult {
    /// The URL the page was requested for
    pub url: String,

    /// Page markup; empty on failure
    pub html: String,

    /// Whether a usable page was retrieved
    pub ok: bool,
}

impl PageFetchResult {
    pub fn success(url: impl Into<String>, html: String) -> Self {
        Self {
            url: url.into(),
            html,
            ok: true,
        }
    }

    pub fn failure(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: String::new(),
            ok: false,
        }
    }
}

/// Anything that can produce page markup for a URL
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches `url`, retrying internally; never fails loudly
    async fn fetch(&self, url: &str) -> PageFetchResult;
}

/// Attempt budget and backoff schedule for one URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Multiplied by the attempt number to get the wait before the next one
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Wait after failed attempt `attempt` (1-based) before trying again
    ///
    /// Returns `None` once the budget is spent.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use sumi_harvest::crawler::RetryPolicy;
    ///
    /// let policy = RetryPolicy::new(3, Duration::from_secs(2));
    /// assert_eq!(policy.delay_after(1), Some(Duration::from_secs(2)));
    /// assert_eq!(policy.delay_after(2), Some(Duration::from_secs(4)));
    /// assert_eq!(policy.delay_after(3), None);
    /// ```
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            None
        } else {
            Some(self.base_delay * attempt)
        }
    }
}

/// Why a single attempt failed
#[derive(Debug, Error)]
enum AttemptError {
    #[error("request timeout")]
    Timeout,

    #[error("proxy returned HTTP {0}")]
    Status(u16),

    #[error("body too short ({0} chars)")]
    ShortBody(usize),

    #[error("{0}")]
    Transport(#[from] reqwest::Error),
}

/// Builds an HTTP client for proxy requests
///
/// # Arguments
///
/// * `timeout` - Per-attempt request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

    Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages through a third-party fetch proxy
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Timeout | Retry |
/// | Transport error | Retry |
/// | Non-2xx status | Retry |
/// | Body under minimum length | Retry |
///
/// The wait before attempt `n + 1` is `base * n`. After the last attempt the
/// fetch reports `ok = false` with empty markup.
pub struct ProxyFetcher {
    client: Client,
    endpoint: Url,
    api_key: String,
    retry: RetryPolicy,
    min_body_length: usize,
}

impl ProxyFetcher {
    /// Creates a fetcher from proxy configuration
    pub fn new(config: &ProxyConfig) -> Result<Self, HarvestError> {
        let client = build_http_client(Duration::from_secs(config.timeout_secs))?;
        let endpoint = Url::parse(&config.endpoint)?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            retry: RetryPolicy::new(
                config.max_attempts,
                Duration::from_millis(config.backoff_base_ms),
            ),
            min_body_length: config.min_body_length,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Builds the proxy request URL for a target page
    ///
    /// # Example
    ///
    /// ```
    /// use sumi_harvest::config::ProxyConfig;
    /// use sumi_harvest::crawler::ProxyFetcher;
    ///
    /// let fetcher = ProxyFetcher::new(&ProxyConfig {
    ///     endpoint: "http://api.scraperapi.com".to_string(),
    ///     api_key: "k".to_string(),
    ///     timeout_secs: 30,
    ///     max_attempts: 3,
    ///     backoff_base_ms: 2000,
    ///     min_body_length: 100,
    /// })
    /// .unwrap();
    ///
    /// let url = fetcher.proxied_url("https://www.ebay.com/itm/1?a=b");
    /// assert_eq!(
    ///     url.as_str(),
    ///     "http://api.scraperapi.com/?api_key=k&url=https%3A%2F%2Fwww.ebay.com%2Fitm%2F1%3Fa%3Db"
    /// );
    /// ```
    pub fn proxied_url(&self, target: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("api_key", &self.api_key)
            .append_pair("url", target);
        url
    }

    /// Performs one proxied GET and validates the body
    async fn attempt(&self, request_url: &Url) -> Result<String, AttemptError> {
        let response = self
            .client
            .get(request_url.clone())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(classify)?;
        let length = body.chars().count();
        if length <= self.min_body_length {
            return Err(AttemptError::ShortBody(length));
        }

        Ok(body)
    }
}

/// Separates timeouts from other transport failures for logging
fn classify(error: reqwest::Error) -> AttemptError {
    if error.is_timeout() {
        AttemptError::Timeout
    } else {
        AttemptError::Transport(error)
    }
}

#[async_trait]
impl PageSource for ProxyFetcher {
    async fn fetch(&self, url: &str) -> PageFetchResult {
        let request_url = self.proxied_url(url);
        let max_attempts = self.retry.max_attempts;

        tracing::debug!("Proxy fetch requested for {}", url);

        for attempt in 1..=max_attempts {
            match self.attempt(&request_url).await {
                Ok(html) => {
                    tracing::debug!(
                        "Fetched {} on attempt {}/{} ({} bytes)",
                        url,
                        attempt,
                        max_attempts,
                        html.len()
                    );
                    return PageFetchResult::success(url, html);
                }
                Err(e) => {
                    tracing::warn!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt,
                        max_attempts,
                        url,
                        e
                    );
                }
            }

            if let Some(delay) = self.retry.delay_after(attempt) {
                tracing::debug!("Backing off {:?} before retrying {}", delay, url);
                tokio::time::sleep(delay).await;
            }
        }

        tracing::error!("All {} attempts failed for {}", max_attempts, url);
        PageFetchResult::failure(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> ProxyConfig {
        ProxyConfig {
            endpoint: "http://proxy.test".to_string(),
            api_key: "secret".to_string(),
            timeout_secs: 30,
            max_attempts: 3,
            backoff_base_ms: 2000,
            min_body_length: 100,
        }
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(Duration::from_secs(30));
        assert!(client.is_ok());
    }

    #[test]
    fn test_proxied_url_encodes_target() {
        let fetcher = ProxyFetcher::new(&create_test_config()).unwrap();
        let url = fetcher.proxied_url("https://www.ebay.com/sch/i.html?_nkw=nike&_pgn=2");

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        assert_eq!(url.host_str(), Some("proxy.test"));
        assert_eq!(
            pairs,
            vec![
                ("api_key".to_string(), "secret".to_string()),
                (
                    "url".to_string(),
                    "https://www.ebay.com/sch/i.html?_nkw=nike&_pgn=2".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_backoff_strictly_increases() {
        let policy = RetryPolicy::new(5, Duration::from_millis(2000));

        let delays: Vec<Duration> = (1..5).filter_map(|n| policy.delay_after(n)).collect();

        assert_eq!(delays.len(), 4);
        for pair in delays.windows(2) {
            assert!(pair[1] > pair[0], "{:?} should exceed {:?}", pair[1], pair[0]);
        }
    }

    #[test]
    fn test_no_delay_after_final_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        assert_eq!(policy.delay_after(2), Some(Duration::from_millis(20)));
        assert_eq!(policy.delay_after(3), None);
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10));
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay_after(1), None);
    }

    #[test]
    fn test_failure_result_is_empty() {
        let result = PageFetchResult::failure("https://www.ebay.com/itm/1");
        assert!(!result.ok);
        assert!(result.html.is_empty());
    }
}
