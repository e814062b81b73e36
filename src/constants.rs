//! Constants module for the AnimeFlow API
//!
//! URL builders for the scraped source site plus catalog defaults shared by
//! the admin forms and the public listing.

/// URL builder functions for the scraped site
pub mod endpoints {
    /// Listing page N of the anime index
    pub fn listing_page(base_url: &str, page: u32) -> String {
        format!("{}/anime/page/{}/", base_url, page)
    }

    /// Resolve a scraped href against the site root
    ///
    /// Absolute links pass through untouched.
    pub fn resolve(base_url: &str, href: &str) -> String {
        let href = href.trim();
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else if let Some(rest) = href.strip_prefix("//") {
            format!("https://{}", rest)
        } else if href.starts_with('/') {
            format!("{}{}", base_url, href)
        } else {
            format!("{}/{}", base_url, href)
        }
    }
}

/// Defaults used by the catalog endpoints and admin forms
pub mod catalog {
    /// Category assigned when the admin form leaves it blank
    pub const DEFAULT_CATEGORY: &str = "Action";

    /// Rating assigned when the admin form leaves it blank
    pub const DEFAULT_RATING: &str = "PG-13";

    /// Category filter value that matches everything
    pub const ALL_CATEGORIES: &str = "All";

    /// Page size of the catalog listing
    pub const DEFAULT_PER_PAGE: u32 = 6;

    /// Largest page size a client may request
    pub const MAX_PER_PAGE: u32 = 100;

    /// Number of records on the home feed
    pub const LATEST_LIMIT: i64 = 100;
}

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LENGTH: usize = 6;

#[cfg(test)]
mod tests {
    use super::endpoints;

    #[test]
    fn test_listing_page_url() {
        assert_eq!(
            endpoints::listing_page("https://site.test", 3),
            "https://site.test/anime/page/3/"
        );
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let base = "https://site.test";
        assert_eq!(endpoints::resolve(base, "/anime/naruto/"), "https://site.test/anime/naruto/");
        assert_eq!(endpoints::resolve(base, "anime/naruto/"), "https://site.test/anime/naruto/");
        assert_eq!(
            endpoints::resolve(base, "https://other.test/anime/x/"),
            "https://other.test/anime/x/"
        );
        assert_eq!(endpoints::resolve(base, "//cdn.test/a/"), "https://cdn.test/a/");
    }
}
