//! Data models for the AnimeFlow API
//!
//! This module contains the data structures exchanged over HTTP: accounts,
//! catalog records, request bodies and the response envelopes.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::constants::catalog;
use crate::roles::{effective_role, Role};

// ============================================================================
// Accounts
// ============================================================================

/// Represents a user account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User ID
    pub id: i32,
    /// User email address
    pub email: String,
    /// User display name (optional)
    pub name: Option<String>,
    /// User avatar URL (optional)
    pub avatar: Option<String>,
    /// Effective role of the account
    pub role: Role,
    /// Banned accounts are signed out on their next request
    pub banned: bool,
    /// ISO timestamp when account was created
    pub created_at: String,
}

impl User {
    /// Apply the configured owner override to the stored role
    pub fn with_effective_role(mut self, owner_email: Option<&str>) -> Self {
        self.role = effective_role(&self.email, self.role.as_str(), owner_email);
        self
    }
}

/// Request body for user registration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// User email address
    pub email: String,
    /// User password (at least 6 characters)
    pub password: String,
    /// Optional display name
    pub name: Option<String>,
}

/// Request body for user login
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for Google OAuth authentication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAuthRequest {
    /// Google ID token from client
    pub id_token: String,
}

/// Request body for editing one's own profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: String,
}

/// Response for authentication endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub data: AuthData,
    pub timestamp: String,
}

/// Authentication data containing user info and JWT token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    pub user: User,
    pub token: String,
}

// ============================================================================
// Envelopes
// ============================================================================

/// Generic API response wrapper for successful responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Whether the operation was successful (always true for this type)
    pub success: bool,
    /// The response payload
    pub data: T,
    /// ISO timestamp of the response
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    /// Create a new successful API response with the current timestamp
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Whether the operation was successful (always false for errors)
    pub success: bool,
    /// Error message describing what went wrong
    pub error: String,
    /// ISO timestamp of when the error occurred
    pub timestamp: String,
}

impl ApiError {
    /// Create a new API error response with the current timestamp
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// An anime record in the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Anime {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Cover image URL
    pub image: String,
    pub category: String,
    pub tags: Vec<String>,
    /// Age rating such as PG-13
    pub rating: String,
    pub featured: bool,
    /// Page the record was scraped from, if any
    pub source_url: Option<String>,
    pub created_at: String,
}

/// An episode belonging to an anime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: Uuid,
    pub anime_id: Uuid,
    pub number: i32,
    pub title: String,
    pub video_url: String,
    pub duration: String,
    pub created_at: String,
}

/// Anime details page payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnimeWithEpisodes {
    pub anime: Anime,
    /// Sorted by episode number
    pub episodes: Vec<Episode>,
}

/// Watch page payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WatchResponse {
    pub anime: Anime,
    pub episode: Episode,
    pub episodes: Vec<Episode>,
}

/// One page of catalog results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnimePage {
    pub items: Vec<Anime>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: u32,
}

impl AnimePage {
    pub fn new(items: Vec<Anime>, filter: &CatalogFilter, total: i64) -> Self {
        let per_page = filter.per_page.max(1);
        let total_pages = ((total.max(0) as u64 + per_page as u64 - 1) / per_page as u64) as u32;
        Self {
            items,
            page: filter.page,
            per_page,
            total,
            total_pages,
        }
    }
}

/// Query parameters for the catalog listing
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    /// Case-insensitive title search
    pub q: Option<String>,
    /// Exact category, "All" matches everything
    pub category: Option<String>,
    /// Page number (1-indexed)
    pub page: Option<u32>,
    /// Items per page
    pub per_page: Option<u32>,
}

/// Normalized catalog filter
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

impl CatalogFilter {
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }
}

impl CatalogQuery {
    pub fn normalize(&self) -> CatalogFilter {
        let search = self
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);
        let category = self
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case(catalog::ALL_CATEGORIES))
            .map(str::to_string);

        CatalogFilter {
            search,
            category,
            page: self.page.unwrap_or(1).max(1),
            per_page: self
                .per_page
                .unwrap_or(catalog::DEFAULT_PER_PAGE)
                .clamp(1, catalog::MAX_PER_PAGE),
        }
    }
}

/// Tags as sent by the dashboard form, either a list or one comma-separated string
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(untagged)]
pub enum TagsInput {
    List(Vec<String>),
    Csv(String),
}

impl TagsInput {
    /// Split, trim and drop empty entries
    pub fn into_tags(self) -> Vec<String> {
        let raw: Vec<String> = match self {
            TagsInput::List(list) => list,
            TagsInput::Csv(csv) => csv.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Request body for adding an anime from the dashboard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnimeRequest {
    pub title: String,
    pub description: String,
    pub image: String,
    pub category: Option<String>,
    pub tags: Option<TagsInput>,
    pub rating: Option<String>,
    pub featured: Option<bool>,
}

/// Validated anime ready for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnime {
    pub title: String,
    pub description: String,
    pub image: String,
    pub category: String,
    pub tags: Vec<String>,
    pub rating: String,
    pub featured: bool,
    pub source_url: Option<String>,
}

fn or_default(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl CreateAnimeRequest {
    pub fn validate(self) -> Result<NewAnime, String> {
        let title = self.title.trim().to_string();
        let description = self.description.trim().to_string();
        let image = self.image.trim().to_string();

        if title.is_empty() || description.is_empty() || image.is_empty() {
            return Err("Title, description and image are required".to_string());
        }

        Ok(NewAnime {
            title,
            description,
            image,
            category: or_default(self.category, catalog::DEFAULT_CATEGORY),
            tags: self.tags.map(TagsInput::into_tags).unwrap_or_default(),
            rating: or_default(self.rating, catalog::DEFAULT_RATING),
            featured: self.featured.unwrap_or(false),
            source_url: None,
        })
    }
}

/// Request body for toggling the featured flag
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedRequest {
    pub featured: bool,
}

/// Request body for adding an episode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEpisodeRequest {
    pub title: String,
    pub number: Option<i32>,
    pub video_url: String,
    pub duration: Option<String>,
}

/// Validated episode ready for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewEpisode {
    pub number: i32,
    pub title: String,
    pub video_url: String,
    pub duration: String,
}

impl CreateEpisodeRequest {
    pub fn validate(self) -> Result<NewEpisode, String> {
        let title = self.title.trim().to_string();
        let video_url = self.video_url.trim().to_string();

        match self.number {
            Some(number) if number > 0 && !title.is_empty() && !video_url.is_empty() => {
                Ok(NewEpisode {
                    number,
                    title,
                    video_url,
                    duration: self.duration.map(|d| d.trim().to_string()).unwrap_or_default(),
                })
            }
            Some(number) if number <= 0 => Err("Episode number must be positive".to_string()),
            _ => Err("Title, number and video URL are required".to_string()),
        }
    }
}

/// Request body for editing an episode; absent fields are kept
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEpisodeRequest {
    pub title: Option<String>,
    pub number: Option<i32>,
    pub video_url: Option<String>,
    pub duration: Option<String>,
}

impl UpdateEpisodeRequest {
    /// Merge onto the current episode
    pub fn apply_to(self, current: &Episode) -> Result<NewEpisode, String> {
        CreateEpisodeRequest {
            title: self.title.unwrap_or_else(|| current.title.clone()),
            number: Some(self.number.unwrap_or(current.number)),
            video_url: self.video_url.unwrap_or_else(|| current.video_url.clone()),
            duration: Some(self.duration.unwrap_or_else(|| current.duration.clone())),
        }
        .validate()
    }
}

// ============================================================================
// Dashboard
// ============================================================================

/// Request body for changing a user's role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub role: String,
}

/// Request body for banning or unbanning a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BanRequest {
    pub banned: bool,
}

/// Request body of the dashboard's user edit dialog
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub banned: Option<bool>,
    pub role: Option<String>,
}

/// Dashboard statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub animes: i64,
    pub users: i64,
}

/// A favorited anime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserFavorite {
    pub anime_id: Uuid,
    pub title: String,
    pub image: String,
    /// ISO timestamp when added to favorites
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: 1,
            email: "aki@example.com".to_string(),
            name: Some("Aki".to_string()),
            avatar: None,
            role: Role::User,
            banned: false,
            created_at: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_user_serializes_camel_case() {
        let json = serde_json::to_string(&sample_user()).unwrap();
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"banned\":false"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn test_owner_override() {
        let user = sample_user().with_effective_role(Some("aki@example.com"));
        assert_eq!(user.role, Role::Owner);
        let user = sample_user().with_effective_role(Some("other@example.com"));
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn test_api_error_shape() {
        let err = ApiError::new("nope");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"error\":\"nope\""));
    }

    #[test]
    fn test_catalog_query_defaults() {
        let filter = CatalogQuery::default().normalize();
        assert_eq!(filter.page, 1);
        assert_eq!(filter.per_page, 6);
        assert_eq!(filter.search, None);
        assert_eq!(filter.category, None);
        assert_eq!(filter.offset(), 0);
    }

    #[test]
    fn test_catalog_query_all_category_and_clamping() {
        let query = CatalogQuery {
            q: Some("  naruto ".to_string()),
            category: Some("all".to_string()),
            page: Some(0),
            per_page: Some(1000),
        };
        let filter = query.normalize();
        assert_eq!(filter.search.as_deref(), Some("naruto"));
        assert_eq!(filter.category, None);
        assert_eq!(filter.page, 1);
        assert_eq!(filter.per_page, 100);
    }

    #[test]
    fn test_catalog_filter_offset() {
        let filter = CatalogQuery {
            page: Some(3),
            ..Default::default()
        }
        .normalize();
        assert_eq!(filter.offset(), 12);
    }

    #[test]
    fn test_anime_page_total_pages() {
        let filter = CatalogQuery::default().normalize();
        assert_eq!(AnimePage::new(vec![], &filter, 0).total_pages, 0);
        assert_eq!(AnimePage::new(vec![], &filter, 6).total_pages, 1);
        assert_eq!(AnimePage::new(vec![], &filter, 7).total_pages, 2);
    }

    #[test]
    fn test_tags_from_csv_and_list() {
        let tags: TagsInput = serde_json::from_str("\" action , drama,,  \"").unwrap();
        assert_eq!(tags.into_tags(), vec!["action", "drama"]);

        let tags: TagsInput = serde_json::from_str("[\"a\", \" b \", \"\"]").unwrap();
        assert_eq!(tags.into_tags(), vec!["a", "b"]);
    }

    #[test]
    fn test_create_anime_requires_fields() {
        let req = CreateAnimeRequest {
            title: "Frieren".to_string(),
            description: " ".to_string(),
            image: "https://img.test/f.jpg".to_string(),
            category: None,
            tags: None,
            rating: None,
            featured: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_create_anime_defaults() {
        let req = CreateAnimeRequest {
            title: "Frieren".to_string(),
            description: "Elf mage".to_string(),
            image: "https://img.test/f.jpg".to_string(),
            category: Some("".to_string()),
            tags: Some(TagsInput::Csv("fantasy, adventure".to_string())),
            rating: None,
            featured: None,
        };
        let anime = req.validate().unwrap();
        assert_eq!(anime.category, "Action");
        assert_eq!(anime.rating, "PG-13");
        assert_eq!(anime.tags, vec!["fantasy", "adventure"]);
        assert!(!anime.featured);
    }

    #[test]
    fn test_create_episode_validation() {
        let missing = CreateEpisodeRequest {
            title: "Ep 1".to_string(),
            number: None,
            video_url: "https://v.test/1.mp4".to_string(),
            duration: None,
        };
        assert!(missing.validate().is_err());

        let zero = CreateEpisodeRequest {
            title: "Ep 0".to_string(),
            number: Some(0),
            video_url: "https://v.test/0.mp4".to_string(),
            duration: None,
        };
        assert_eq!(zero.validate().unwrap_err(), "Episode number must be positive");

        let ok = CreateEpisodeRequest {
            title: "Ep 1".to_string(),
            number: Some(1),
            video_url: "https://v.test/1.mp4".to_string(),
            duration: Some("24m".to_string()),
        };
        assert_eq!(ok.validate().unwrap().duration, "24m");
    }

    #[test]
    fn test_update_episode_merges() {
        let current = Episode {
            id: Uuid::new_v4(),
            anime_id: Uuid::new_v4(),
            number: 2,
            title: "Old".to_string(),
            video_url: "https://v.test/2.mp4".to_string(),
            duration: "23m".to_string(),
            created_at: "2024-01-01T00:00:00+00:00".to_string(),
        };
        let merged = UpdateEpisodeRequest {
            title: Some("New".to_string()),
            ..Default::default()
        }
        .apply_to(&current)
        .unwrap();
        assert_eq!(merged.title, "New");
        assert_eq!(merged.number, 2);
        assert_eq!(merged.duration, "23m");
    }
}
