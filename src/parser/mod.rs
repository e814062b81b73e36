//! HTML parser for the scraped catalog site
//!
//! Two page shapes are understood: the paginated anime index, from which
//! detail links are collected, and the anime detail page.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must be valid CSS")
}

static CARD_LINK: LazyLock<Selector> = LazyLock::new(|| selector(".anime-card a"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("h1.anime-details-title"));
static SYNOPSIS: LazyLock<Selector> = LazyLock::new(|| selector(".anime-details p"));
static THUMBNAIL: LazyLock<Selector> = LazyLock::new(|| selector(".anime-thumbnail img"));
static GENRE: LazyLock<Selector> = LazyLock::new(|| selector(".anime-genres a"));
static EPISODE_LINK: LazyLock<Selector> = LazyLock::new(|| selector(".episodes-list a"));

/// Episode link found on a detail page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapedEpisode {
    pub title: String,
    pub url: String,
}

/// Everything extracted from one anime detail page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapedAnime {
    pub title: String,
    pub description: String,
    pub image: String,
    pub genres: Vec<String>,
    pub episodes: Vec<ScrapedEpisode>,
    pub source_url: String,
}

fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collect detail links from a listing page
///
/// Links keep their page order and each appears once, even when a card
/// carries several anchors to the same detail page.
pub fn parse_listing_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();

    document
        .select(&CARD_LINK)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty() && !href.starts_with('#'))
        .filter(|href| seen.insert(href.to_string()))
        .map(str::to_string)
        .collect()
}

/// Parse an anime detail page
///
/// Missing elements yield empty strings or lists; callers decide whether
/// the result is usable.
pub fn parse_anime_page(html: &str, source_url: &str) -> ScrapedAnime {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE)
        .next()
        .map(text_of)
        .unwrap_or_default();

    let description = document
        .select(&SYNOPSIS)
        .next()
        .map(text_of)
        .unwrap_or_default();

    let image = document
        .select(&THUMBNAIL)
        .next()
        .and_then(|img| {
            img.value()
                .attr("src")
                .filter(|src| !src.trim().is_empty())
                .or_else(|| img.value().attr("data-src"))
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let genres = document
        .select(&GENRE)
        .map(text_of)
        .filter(|g| !g.is_empty())
        .collect();

    let episodes = document
        .select(&EPISODE_LINK)
        .filter_map(|a| {
            let url = a.value().attr("href")?.trim().to_string();
            if url.is_empty() {
                return None;
            }
            Some(ScrapedEpisode {
                title: text_of(a),
                url,
            })
        })
        .collect();

    ScrapedAnime {
        title,
        description,
        image,
        genres,
        episodes,
        source_url: source_url.to_string(),
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn listing_html(slugs: &[String]) -> String {
        let cards: String = slugs
            .iter()
            .map(|s| format!(r#"<div class="anime-card"><a href="/anime/{}/">{}</a></div>"#, s, s))
            .collect();
        format!("<html><body>{}</body></html>", cards)
    }

    proptest! {
        /// Each distinct link is returned exactly once, in first-seen order
        #[test]
        fn property_listing_links_unique(slugs in prop::collection::vec("[a-z]{1,4}", 0..20)) {
            let links = parse_listing_links(&listing_html(&slugs));

            let mut expected = Vec::new();
            for slug in &slugs {
                let link = format!("/anime/{}/", slug);
                if !expected.contains(&link) {
                    expected.push(link);
                }
            }
            prop_assert_eq!(links, expected);
        }
    }
}
