//! Catalog crawler
//!
//! One-shot run: crawls the configured listing pages and writes every
//! scraped anime into the catalog. Per-item failures are logged and the
//! run carries on; the process exits non-zero only when it cannot start.

use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use animeflow::config::CrawlerConfig;
use animeflow::crawler::{run_crawl, CrawlOptions};
use animeflow::db::Database;
use animeflow::scraper::{Scraper, ScraperConfig};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match CrawlerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let db = match Database::new(&config.database_url).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = db.run_migrations().await {
        error!("Failed to run database migrations: {}", e);
        db.close().await;
        return ExitCode::FAILURE;
    }

    let scraper = match Scraper::with_config(ScraperConfig::from(&config)) {
        Ok(scraper) => scraper,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            db.close().await;
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Crawling {} (up to {} pages)",
        config.base_url, config.max_pages
    );
    let report = run_crawl(&scraper, &db, &CrawlOptions::from(&config)).await;

    info!(
        "Inserted {} anime with {} episodes, {} requests made",
        report.inserted,
        report.episodes_inserted,
        scraper.request_count()
    );
    for message in &report.errors {
        info!("Skipped: {}", message);
    }

    db.close().await;
    ExitCode::SUCCESS
}
