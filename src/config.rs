//! Configuration module for the AnimeFlow API
//!
//! Handles loading environment variables for the HTTP server and the
//! catalog scraper. Both read `.env` first through dotenvy.

use std::env;
use std::str::FromStr;

use thiserror::Error;

/// Default source site for the catalog scraper
pub const DEFAULT_SCRAPER_BASE_URL: &str = "https://anime4up.rest";

/// Configuration errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret key for token signing
    pub jwt_secret: String,
    /// Google OAuth client ID
    pub google_client_id: Option<String>,
    /// Email of the account that is always treated as owner
    pub owner_email: Option<String>,
    /// Crawler settings used by the admin crawl endpoint
    pub crawler: CrawlerConfig,
}

/// Catalog scraper configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlerConfig {
    /// Database connection URL
    pub database_url: String,
    /// Root of the scraped site, without trailing slash
    pub base_url: String,
    /// Hard cutoff on listing pages per run
    pub max_pages: u32,
    /// Attempts per request (1 disables retry)
    pub max_retries: u32,
    /// Lower bound of the politeness delay between requests
    pub min_delay_ms: u64,
    /// Upper bound of the politeness delay between requests
    pub max_delay_ms: u64,
    /// Pick a random browser User-Agent per request
    pub rotate_user_agent: bool,
}

impl Config {
    /// Load server configuration from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let crawler = CrawlerConfig::from_env()?;

        Ok(Self {
            database_url: crawler.database_url.clone(),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 8080)?,
            jwt_secret: required("JWT_SECRET")?,
            google_client_id: optional("GOOGLE_CLIENT_ID"),
            owner_email: optional("OWNER_EMAIL").map(|e| e.trim().to_lowercase()),
            crawler,
        })
    }
}

impl CrawlerConfig {
    /// Load scraper configuration from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let min_delay_ms = parse_var("SCRAPER_MIN_DELAY_MS", 0)?;
        let max_delay_ms: u64 = parse_var("SCRAPER_MAX_DELAY_MS", 0)?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            base_url: env::var("SCRAPER_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_SCRAPER_BASE_URL.to_string()),
            max_pages: parse_var("SCRAPER_MAX_PAGES", 2)?,
            max_retries: parse_var::<u32>("SCRAPER_MAX_RETRIES", 1)?.max(1),
            min_delay_ms,
            max_delay_ms: max_delay_ms.max(min_delay_ms),
            rotate_user_agent: parse_var("SCRAPER_ROTATE_UA", false)?,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}
