//! HTTP fetcher for the catalog crawler
//!
//! Sends browser-like requests one at a time, with an optional random
//! politeness delay and an optional retry on 429/5xx.

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

use crate::config::CrawlerConfig;
use crate::crawler::PageFetcher;

/// Errors that can occur during scraping operations
#[derive(Error, Debug)]
pub enum ScraperError {
    /// Connection timeout, DNS failure and the like
    #[error("Failed to connect to server: {0}")]
    NetworkError(String),

    /// Any status other than 200
    #[error("Server returned status {0}")]
    HttpError(u16),

    #[error("Failed to read response body: {0}")]
    ResponseError(String),

    /// The HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    ClientError(String),
}

impl ScraperError {
    fn is_retryable(&self) -> bool {
        match self {
            ScraperError::HttpError(status) => *status == 429 || *status >= 500,
            ScraperError::NetworkError(_) => true,
            _ => false,
        }
    }
}

/// Request pacing and retry settings
#[derive(Debug, Clone, PartialEq)]
pub struct ScraperConfig {
    /// Minimum delay between requests in milliseconds
    pub min_delay_ms: u64,
    /// Maximum delay between requests in milliseconds
    pub max_delay_ms: u64,
    /// Whether to rotate user agents
    pub rotate_user_agent: bool,
    /// Attempts per URL, at least one
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds
    pub backoff_base_ms: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
            rotate_user_agent: false,
            max_retries: 1,
            backoff_base_ms: 1000,
        }
    }
}

impl From<&CrawlerConfig> for ScraperConfig {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            min_delay_ms: config.min_delay_ms,
            max_delay_ms: config.max_delay_ms.max(config.min_delay_ms),
            max_retries: config.max_retries.max(1),
            rotate_user_agent: config.rotate_user_agent,
            ..Self::default()
        }
    }
}

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
];

/// HTTP client for scraping web pages
pub struct Scraper {
    client: Client,
    config: ScraperConfig,
    request_count: AtomicUsize,
}

impl Scraper {
    pub fn new() -> Result<Self, ScraperError> {
        Self::with_config(ScraperConfig::default())
    }

    pub fn with_config(config: ScraperConfig) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ScraperError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            config,
            request_count: AtomicUsize::new(0),
        })
    }

    fn user_agent(&self) -> &'static str {
        if self.config.rotate_user_agent {
            let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
            USER_AGENTS[idx]
        } else {
            USER_AGENTS[0]
        }
    }

    async fn apply_delay(&self) {
        if self.config.max_delay_ms == 0 {
            return;
        }
        let delay = rand::thread_rng().gen_range(self.config.min_delay_ms..=self.config.max_delay_ms);
        sleep(Duration::from_millis(delay)).await;
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let delay = self.config.backoff_base_ms.saturating_mul(2u64.saturating_pow(attempt));
        let jitter = rand::thread_rng().gen_range(0..250);
        Duration::from_millis(delay + jitter)
    }

    /// Fetch a page body, pacing and retrying as configured
    pub async fn fetch_page(&self, url: &str) -> Result<String, ScraperError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        if count > 0 {
            self.apply_delay().await;
        }

        let attempts = self.config.max_retries.max(1);
        let mut attempt = 0;

        loop {
            match self.do_fetch(url).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    attempt += 1;
                    warn!("{} on attempt {} for {}, retrying", e, attempt, url);
                    sleep(self.backoff(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn do_fetch(&self, url: &str) -> Result<String, ScraperError> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", self.user_agent())
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.9,ar;q=0.8")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScraperError::NetworkError("Connection timeout".to_string())
                } else {
                    ScraperError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ScraperError::HttpError(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| ScraperError::ResponseError(e.to_string()))
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for Scraper {
    async fn fetch(&self, url: &str) -> Result<String, ScraperError> {
        self.fetch_page(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scraper_creation() {
        let scraper = Scraper::new().unwrap();
        assert_eq!(scraper.request_count(), 0);
        assert_eq!(scraper.user_agent(), USER_AGENTS[0]);
    }

    #[test]
    fn test_default_config_is_single_attempt() {
        let config = ScraperConfig::default();
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.max_delay_ms, 0);
        assert!(!config.rotate_user_agent);
    }

    #[test]
    fn test_config_from_crawler_config() {
        let crawler = CrawlerConfig {
            database_url: "postgres://localhost/test".to_string(),
            base_url: "https://site.test".to_string(),
            max_pages: 2,
            max_retries: 0,
            min_delay_ms: 500,
            max_delay_ms: 100,
            rotate_user_agent: true,
        };
        let config = ScraperConfig::from(&crawler);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.min_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 500);
        assert!(config.rotate_user_agent);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ScraperError::HttpError(429).is_retryable());
        assert!(ScraperError::HttpError(503).is_retryable());
        assert!(!ScraperError::HttpError(404).is_retryable());
        assert!(!ScraperError::ResponseError("eof".to_string()).is_retryable());
    }

    #[test]
    fn test_rotating_user_agent_comes_from_list() {
        let scraper = Scraper::with_config(ScraperConfig {
            rotate_user_agent: true,
            ..ScraperConfig::default()
        })
        .unwrap();
        for _ in 0..10 {
            assert!(USER_AGENTS.contains(&scraper.user_agent()));
        }
    }

    #[test]
    fn test_backoff_grows() {
        let scraper = Scraper::new().unwrap();
        assert!(scraper.backoff(2) > scraper.backoff(0));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let scraper = Scraper::new().unwrap();
        let result = scraper.fetch_page("http://127.0.0.1:9/anime/page/1/").await;
        assert!(matches!(result, Err(ScraperError::NetworkError(_))));
    }
}
