#[cfg(test)]
mod tests;

use anyhow::{Context, Result, anyhow};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, warn};
use ureq::Agent;
use url::Url;

use crate::config::ScraperConfig;

/// Configuration for the scraper HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// User agent string to use for requests
    pub user_agent: String,
    /// Timeout for HTTP requests in seconds
    pub timeout_seconds: u64,
    /// Minimum interval between consecutive requests
    pub min_interval: Duration,
    /// Maximum number of retry attempts for retryable errors
    pub max_retries: u32,
    /// Delay between retry attempts
    pub retry_delay: Duration,
}

impl Default for HttpClientConfig {
    #[inline]
    fn default() -> Self {
        Self::from_scraper(&ScraperConfig::default(), Duration::from_millis(500))
    }
}

impl HttpClientConfig {
    /// Build a client configuration with a per-source request interval
    #[inline]
    pub fn from_scraper(config: &ScraperConfig, min_interval: Duration) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout_seconds: config.timeout_seconds,
            min_interval,
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Non-success HTTP status, kept typed so callers can react to quota errors
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("HTTP error {0}")]
pub struct HttpStatusError(pub u16);

/// Status code of a failed request, if the failure was an HTTP status
#[inline]
pub fn status_code(error: &anyhow::Error) -> Option<u16> {
    error.downcast_ref::<HttpStatusError>().map(|e| e.0)
}

/// HTTP client wrapper with rate limiting and retry logic
#[derive(Debug)]
pub struct HttpClient {
    agent: Agent,
    config: HttpClientConfig,
    last_request_time: Option<Instant>,
}

impl HttpClient {
    #[inline]
    pub fn new(config: HttpClientConfig) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .user_agent(&config.user_agent)
            .build()
            .into();

        Self {
            agent,
            config,
            last_request_time: None,
        }
    }

    /// Perform an HTTP GET request with rate limiting and retry logic
    #[inline]
    pub async fn get(&mut self, url: &str) -> Result<String> {
        self.apply_rate_limit().await;

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!("Retrying request to {} (attempt {})", url, attempt + 1);
                sleep(self.config.retry_delay).await;
            }

            match self.try_get(url) {
                Ok(response) => {
                    debug!("Successfully fetched {} (attempt {})", url, attempt + 1);
                    return Ok(response);
                }
                Err(e) if is_retryable_error(&e) && attempt < self.config.max_retries => {
                    warn!("Retryable error for {}: {}", url, e);
                    last_error = Some(e);
                }
                Err(e) => {
                    error!("Non-retryable error for {}: {}", url, e);
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("All retry attempts failed")))
    }

    /// GET a URL with query parameters appended
    #[inline]
    pub async fn get_with_query(&mut self, base: &str, params: &[(&str, &str)]) -> Result<String> {
        let mut url = validate_url(base)?;
        url.query_pairs_mut().extend_pairs(params);
        self.get(url.as_str()).await
    }

    /// GET and deserialize a JSON body
    #[inline]
    pub async fn get_json<T: DeserializeOwned>(
        &mut self,
        base: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let body = self.get_with_query(base, params).await?;
        serde_json::from_str(&body).with_context(|| format!("Failed to parse JSON from {}", base))
    }

    /// Apply rate limiting by sleeping if necessary
    async fn apply_rate_limit(&mut self) {
        if let Some(last_time) = self.last_request_time {
            let elapsed = last_time.elapsed();

            if elapsed < self.config.min_interval {
                let sleep_duration = self.config.min_interval - elapsed;
                debug!("Rate limiting: sleeping for {:?}", sleep_duration);
                sleep(sleep_duration).await;
            }
        }

        self.last_request_time = Some(Instant::now());
    }

    /// Attempt a single HTTP GET request without retry logic
    fn try_get(&self, url: &str) -> Result<String> {
        debug!("Making HTTP GET request to: {}", url);

        match self.agent.get(url).call() {
            Ok(mut response) => {
                let text = response
                    .body_mut()
                    .read_to_string()
                    .with_context(|| format!("Failed to read response body from {}", url))?;
                debug!("Successfully read {} bytes from {}", text.len(), url);
                Ok(text)
            }
            Err(ureq::Error::StatusCode(code)) => {
                debug!("HTTP request failed with status {}: {}", code, url);
                Err(HttpStatusError(code).into())
            }
            Err(e) => {
                debug!("HTTP request failed with transport error: {}", e);
                Err(anyhow::Error::from(e))
                    .with_context(|| format!("Failed to make HTTP request to {}", url))
            }
        }
    }
}

impl Default for HttpClient {
    #[inline]
    fn default() -> Self {
        Self::new(HttpClientConfig::default())
    }
}

/// Timeouts, connection failures, 5xx and 429 are worth retrying
fn is_retryable_error(error: &anyhow::Error) -> bool {
    if let Some(status) = status_code(error) {
        return status >= 500 || status == 429;
    }

    let error_str = format!("{:#}", error).to_lowercase();
    error_str.contains("timeout")
        || error_str.contains("timed out")
        || error_str.contains("connection")
        || error_str.contains("network")
}

/// Validate and normalize a URL
#[inline]
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str).with_context(|| format!("Invalid URL format: {}", url_str))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow!("URL must use HTTP or HTTPS scheme: {}", url_str));
    }

    if url.host_str().is_none() {
        return Err(anyhow!("URL must have a valid host: {}", url_str));
    }

    Ok(url)
}
