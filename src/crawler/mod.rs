//! Sequential catalog crawler
//!
//! Walks listing pages one by one, follows every new detail link and hands
//! each parsed anime to a [`CatalogSink`]. Per-item failures are logged,
//! recorded in the report and skipped; nothing aborts the run.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::config::CrawlerConfig;
use crate::constants::endpoints;
use crate::db::RepositoryError;
use crate::parser::{parse_anime_page, parse_listing_links, ScrapedAnime};
use crate::scraper::ScraperError;

/// Source of raw HTML
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ScraperError>;
}

/// Destination for scraped records
#[async_trait]
pub trait CatalogSink: Send + Sync {
    /// Store one anime with its episodes. No existence check is made.
    async fn insert_scraped(&self, anime: &ScrapedAnime) -> Result<(), RepositoryError>;
}

/// Crawl bounds
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlOptions {
    pub base_url: String,
    pub max_pages: u32,
}

impl From<&CrawlerConfig> for CrawlOptions {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            max_pages: config.max_pages,
        }
    }
}

/// Outcome of a crawl run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CrawlReport {
    /// Listing pages fetched and parsed
    pub pages_processed: u32,
    /// Distinct detail links queued
    pub links_found: u32,
    /// Anime records written
    pub inserted: u32,
    /// Episodes written along with them
    pub episodes_inserted: u32,
    /// Items that were skipped
    pub skipped: u32,
    pub errors: Vec<String>,
}

impl CrawlReport {
    fn skip(&mut self, message: String) {
        warn!("{}", message);
        self.skipped += 1;
        self.errors.push(message);
    }
}

/// Run one crawl
///
/// Stops after `max_pages` listing pages or at the first listing page that
/// yields no links. A listing page that fails to download is recorded and
/// the crawl moves on to the next page.
pub async fn run_crawl(
    fetcher: &dyn PageFetcher,
    sink: &dyn CatalogSink,
    options: &CrawlOptions,
) -> CrawlReport {
    let mut report = CrawlReport::default();
    let mut seen: HashSet<String> = HashSet::new();

    for page in 1..=options.max_pages {
        let listing_url = endpoints::listing_page(&options.base_url, page);
        info!("Crawling page {}: {}", page, listing_url);

        let html = match fetcher.fetch(&listing_url).await {
            Ok(html) => html,
            Err(e) => {
                report.skip(format!("Failed to fetch page {}: {}", page, e));
                continue;
            }
        };

        let links = parse_listing_links(&html);
        if links.is_empty() {
            info!("No anime found on page {}, stopping", page);
            break;
        }
        report.pages_processed += 1;

        for href in links {
            let detail_url = endpoints::resolve(&options.base_url, &href);
            if !seen.insert(detail_url.clone()) {
                continue;
            }
            report.links_found += 1;

            let html = match fetcher.fetch(&detail_url).await {
                Ok(html) => html,
                Err(e) => {
                    report.skip(format!("Failed to fetch {}: {}", detail_url, e));
                    continue;
                }
            };

            let anime = parse_anime_page(&html, &detail_url);
            if anime.title.is_empty() {
                report.skip(format!("No title found on {}", detail_url));
                continue;
            }

            match sink.insert_scraped(&anime).await {
                Ok(()) => {
                    info!("Saved: {}", anime.title);
                    report.inserted += 1;
                    report.episodes_inserted += anime.episodes.len() as u32;
                }
                Err(e) => report.skip(format!("Failed to save {}: {}", anime.title, e)),
            }
        }
    }

    info!(
        "Crawl finished: {} pages, {} links, {} inserted, {} skipped",
        report.pages_processed, report.links_found, report.inserted, report.skipped
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const BASE: &str = "https://site.test";

    #[derive(Default)]
    struct FakeSite {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl FakeSite {
        fn with(mut self, url: &str, html: String) -> Self {
            self.pages.insert(url.to_string(), html);
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for FakeSite {
        async fn fetch(&self, url: &str) -> Result<String, ScraperError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or(ScraperError::HttpError(404))
        }
    }

    #[derive(Default)]
    struct MemorySink {
        saved: Mutex<Vec<ScrapedAnime>>,
        reject: Option<String>,
    }

    impl MemorySink {
        fn titles(&self) -> Vec<String> {
            self.saved.lock().unwrap().iter().map(|a| a.title.clone()).collect()
        }
    }

    #[async_trait]
    impl CatalogSink for MemorySink {
        async fn insert_scraped(&self, anime: &ScrapedAnime) -> Result<(), RepositoryError> {
            if self.reject.as_deref() == Some(anime.title.as_str()) {
                return Err(RepositoryError::Conflict("rejected".to_string()));
            }
            self.saved.lock().unwrap().push(anime.clone());
            Ok(())
        }
    }

    fn listing(slugs: &[&str]) -> String {
        let cards: String = slugs
            .iter()
            .map(|s| format!(r#"<div class="anime-card"><a href="/anime/{}/">{}</a></div>"#, s, s))
            .collect();
        format!("<html><body>{}</body></html>", cards)
    }

    fn detail(title: &str, episodes: usize) -> String {
        let eps: String = (1..=episodes)
            .map(|n| format!(r#"<a href="/ep/{}/">Episode {}</a>"#, n, n))
            .collect();
        format!(
            r#"<h1 class="anime-details-title">{}</h1>
               <div class="anime-details"><p>Story</p></div>
               <div class="anime-thumbnail"><img src="https://img.test/x.jpg"></div>
               <div class="episodes-list">{}</div>"#,
            title, eps
        )
    }

    fn page_url(n: u32) -> String {
        endpoints::listing_page(BASE, n)
    }

    fn detail_url(slug: &str) -> String {
        format!("{}/anime/{}/", BASE, slug)
    }

    fn options(max_pages: u32) -> CrawlOptions {
        CrawlOptions {
            base_url: BASE.to_string(),
            max_pages,
        }
    }

    #[tokio::test]
    async fn test_duplicate_link_fetched_once() {
        let site = FakeSite::default()
            .with(&page_url(1), listing(&["naruto", "naruto", "bleach"]))
            .with(&detail_url("naruto"), detail("Naruto", 2))
            .with(&detail_url("bleach"), detail("Bleach", 0));
        let sink = MemorySink::default();

        let report = run_crawl(&site, &sink, &options(1)).await;

        let naruto_fetches = site
            .requests()
            .iter()
            .filter(|u| **u == detail_url("naruto"))
            .count();
        assert_eq!(naruto_fetches, 1);
        assert_eq!(report.links_found, 2);
        assert_eq!(sink.titles(), vec!["Naruto", "Bleach"]);
        assert_eq!(report.episodes_inserted, 2);
    }

    #[tokio::test]
    async fn test_failed_detail_does_not_stop_run() {
        let site = FakeSite::default()
            .with(&page_url(1), listing(&["a", "missing", "b"]))
            .with(&page_url(2), listing(&["c"]))
            .with(&detail_url("a"), detail("A", 1))
            .with(&detail_url("b"), detail("B", 1))
            .with(&detail_url("c"), detail("C", 1));
        let sink = MemorySink::default();

        let report = run_crawl(&site, &sink, &options(2)).await;

        assert_eq!(sink.titles(), vec!["A", "B", "C"]);
        assert_eq!(report.pages_processed, 2);
        assert_eq!(report.inserted, 3);
        assert_eq!(report.skipped, 1);
        assert!(report.errors[0].contains("/anime/missing/"));
    }

    #[tokio::test]
    async fn test_failed_insert_and_untitled_page_are_skipped() {
        let site = FakeSite::default()
            .with(&page_url(1), listing(&["a", "blank", "b"]))
            .with(&detail_url("a"), detail("A", 0))
            .with(&detail_url("blank"), "<html><body>maintenance</body></html>".to_string())
            .with(&detail_url("b"), detail("B", 0));
        let sink = MemorySink {
            reject: Some("A".to_string()),
            ..Default::default()
        };

        let report = run_crawl(&site, &sink, &options(1)).await;

        assert_eq!(sink.titles(), vec!["B"]);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.inserted, 1);
    }

    #[tokio::test]
    async fn test_stops_at_empty_page() {
        let site = FakeSite::default()
            .with(&page_url(1), listing(&["a"]))
            .with(&page_url(2), listing(&[]))
            .with(&page_url(3), listing(&["z"]))
            .with(&detail_url("a"), detail("A", 0))
            .with(&detail_url("z"), detail("Z", 0));
        let sink = MemorySink::default();

        let report = run_crawl(&site, &sink, &options(5)).await;

        assert_eq!(report.pages_processed, 1);
        assert_eq!(sink.titles(), vec!["A"]);
        assert!(!site.requests().contains(&page_url(3)));
    }

    #[tokio::test]
    async fn test_page_cutoff() {
        let site = FakeSite::default()
            .with(&page_url(1), listing(&["a"]))
            .with(&page_url(2), listing(&["b"]))
            .with(&page_url(3), listing(&["c"]))
            .with(&detail_url("a"), detail("A", 0))
            .with(&detail_url("b"), detail("B", 0))
            .with(&detail_url("c"), detail("C", 0));
        let sink = MemorySink::default();

        let report = run_crawl(&site, &sink, &options(2)).await;

        assert_eq!(report.pages_processed, 2);
        assert!(!site.requests().contains(&page_url(3)));
    }

    #[tokio::test]
    async fn test_failed_listing_moves_to_next_page() {
        let site = FakeSite::default()
            .with(&page_url(2), listing(&["b"]))
            .with(&detail_url("b"), detail("B", 0));
        let sink = MemorySink::default();

        let report = run_crawl(&site, &sink, &options(2)).await;

        assert_eq!(sink.titles(), vec!["B"]);
        assert_eq!(report.pages_processed, 1);
        assert!(report.errors[0].contains("page 1"));
    }

    #[tokio::test]
    async fn test_link_seen_on_earlier_page_not_refetched() {
        let site = FakeSite::default()
            .with(&page_url(1), listing(&["a"]))
            .with(&page_url(2), listing(&["a", "b"]))
            .with(&detail_url("a"), detail("A", 0))
            .with(&detail_url("b"), detail("B", 0));
        let sink = MemorySink::default();

        let report = run_crawl(&site, &sink, &options(2)).await;

        assert_eq!(sink.titles(), vec!["A", "B"]);
        assert_eq!(report.links_found, 2);
    }
}
