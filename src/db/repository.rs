//! Repository module for AnimeFlow persistence
//!
//! Free functions over a `PgPool` for the users, animes, episodes,
//! user_favorites and user_settings tables.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

use crate::constants::catalog;
use crate::models::{Anime, CatalogFilter, Episode, NewAnime, NewEpisode, User, UserFavorite};
use crate::parser::ScrapedAnime;
use crate::roles::Role;
use crate::settings::{Settings, SETTINGS_KEY};

/// Repository-related errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

fn timestamp(row: &PgRow, column: &str) -> String {
    row.get::<DateTime<Utc>, _>(column).to_rfc3339()
}

// ============================================================================
// Users
// ============================================================================

const USER_COLUMNS: &str = "id, email, name, avatar, role, banned, created_at";

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        avatar: row.get("avatar"),
        role: Role::parse(row.get::<&str, _>("role")),
        banned: row.get("banned"),
        created_at: timestamp(row, "created_at"),
    }
}

/// Emails are stored lowercased; uniqueness is case-insensitive
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Create a password account with role `user`
pub async fn create_user(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
    name: Option<&str>,
) -> RepositoryResult<User> {
    let row = sqlx::query(&format!(
        "INSERT INTO users (email, password_hash, name, role, banned)
         VALUES ($1, $2, $3, 'user', FALSE)
         RETURNING {}",
        USER_COLUMNS
    ))
    .bind(normalize_email(email))
    .bind(password_hash)
    .bind(name)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            RepositoryError::EmailAlreadyExists
        } else {
            RepositoryError::DatabaseError(e)
        }
    })?;

    Ok(user_from_row(&row))
}

/// Create an account from a verified Google identity
pub async fn create_google_user(
    pool: &PgPool,
    email: &str,
    google_id: &str,
    name: &str,
    avatar: Option<&str>,
) -> RepositoryResult<User> {
    let row = sqlx::query(&format!(
        "INSERT INTO users (email, google_id, name, avatar, role, banned)
         VALUES ($1, $2, $3, $4, 'user', FALSE)
         RETURNING {}",
        USER_COLUMNS
    ))
    .bind(normalize_email(email))
    .bind(google_id)
    .bind(name)
    .bind(avatar)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            RepositoryError::EmailAlreadyExists
        } else {
            RepositoryError::DatabaseError(e)
        }
    })?;

    Ok(user_from_row(&row))
}

/// Look up an account and its password hash by email (case-insensitive)
pub async fn find_user_by_email(
    pool: &PgPool,
    email: &str,
) -> RepositoryResult<Option<(User, Option<String>)>> {
    let row = sqlx::query(&format!(
        "SELECT {}, password_hash FROM users WHERE lower(email) = lower($1)",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| (user_from_row(&r), r.get("password_hash"))))
}

pub async fn find_user_by_google_id(pool: &PgPool, google_id: &str) -> RepositoryResult<Option<User>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE google_id = $1",
        USER_COLUMNS
    ))
    .bind(google_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(user_from_row))
}

pub async fn find_user_by_id(pool: &PgPool, id: i32) -> RepositoryResult<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(user_from_row))
}

pub async fn link_google_account(pool: &PgPool, user_id: i32, google_id: &str) -> RepositoryResult<()> {
    sqlx::query("UPDATE users SET google_id = $1, updated_at = NOW() WHERE id = $2")
        .bind(google_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// All accounts, newest first
pub async fn list_users(pool: &PgPool) -> RepositoryResult<Vec<User>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC, id DESC",
        USER_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(user_from_row).collect())
}

async fn update_user_column<T>(pool: &PgPool, id: i32, column: &str, value: T) -> RepositoryResult<User>
where
    T: for<'q> sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres> + Send + 'static,
{
    let row = sqlx::query(&format!(
        "UPDATE users SET {} = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
        column, USER_COLUMNS
    ))
    .bind(value)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref()
        .map(user_from_row)
        .ok_or_else(|| RepositoryError::NotFound("User".to_string()))
}

pub async fn update_user_name(pool: &PgPool, id: i32, name: &str) -> RepositoryResult<User> {
    update_user_column(pool, id, "name", name.to_string()).await
}

pub async fn set_user_banned(pool: &PgPool, id: i32, banned: bool) -> RepositoryResult<User> {
    update_user_column(pool, id, "banned", banned).await
}

pub async fn set_user_role(pool: &PgPool, id: i32, role: Role) -> RepositoryResult<User> {
    update_user_column(pool, id, "role", role.as_str().to_string()).await
}

/// Apply the dashboard's edit dialog in one statement
///
/// `None` keeps the current value, so either every field lands or none does.
pub async fn update_user_fields(
    pool: &PgPool,
    id: i32,
    name: Option<&str>,
    banned: Option<bool>,
    role: Option<Role>,
) -> RepositoryResult<User> {
    let row = sqlx::query(&format!(
        "UPDATE users
         SET name = COALESCE($1, name),
             banned = COALESCE($2, banned),
             role = COALESCE($3, role),
             updated_at = NOW()
         WHERE id = $4
         RETURNING {}",
        USER_COLUMNS
    ))
    .bind(name)
    .bind(banned)
    .bind(role.map(|r| r.as_str()))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref()
        .map(user_from_row)
        .ok_or_else(|| RepositoryError::NotFound("User".to_string()))
}

pub async fn delete_user(pool: &PgPool, id: i32) -> RepositoryResult<()> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound("User".to_string()));
    }
    Ok(())
}

pub async fn count_users(pool: &PgPool) -> RepositoryResult<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM users")
        .fetch_one(pool)
        .await?;
    Ok(row.get("count"))
}

// ============================================================================
// Anime
// ============================================================================

const ANIME_COLUMNS: &str =
    "id, title, description, image, category, tags, rating, featured, source_url, created_at";

fn anime_from_row(row: &PgRow) -> Anime {
    Anime {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        image: row.get("image"),
        category: row.get("category"),
        tags: row.get("tags"),
        rating: row.get("rating"),
        featured: row.get("featured"),
        source_url: row.get("source_url"),
        created_at: timestamp(row, "created_at"),
    }
}

pub async fn insert_anime(pool: &PgPool, anime: &NewAnime) -> RepositoryResult<Anime> {
    let row = sqlx::query(&format!(
        "INSERT INTO animes (id, title, description, image, category, tags, rating, featured, source_url)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING {}",
        ANIME_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(&anime.title)
    .bind(&anime.description)
    .bind(&anime.image)
    .bind(&anime.category)
    .bind(&anime.tags)
    .bind(&anime.rating)
    .bind(anime.featured)
    .bind(&anime.source_url)
    .fetch_one(pool)
    .await?;

    Ok(anime_from_row(&row))
}

/// Insert a scraped anime and its episodes in one transaction
///
/// Episodes are numbered in page order starting at 1.
pub async fn insert_scraped_anime(pool: &PgPool, scraped: &ScrapedAnime) -> RepositoryResult<Uuid> {
    let anime_id = Uuid::new_v4();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO animes (id, title, description, image, category, tags, rating, source_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(anime_id)
    .bind(&scraped.title)
    .bind(&scraped.description)
    .bind(&scraped.image)
    .bind(scraped.genres.first().map(String::as_str).unwrap_or(catalog::DEFAULT_CATEGORY))
    .bind(&scraped.genres)
    .bind(catalog::DEFAULT_RATING)
    .bind(&scraped.source_url)
    .execute(&mut *tx)
    .await?;

    for (index, episode) in scraped.episodes.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO episodes (id, anime_id, number, title, video_url)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(anime_id)
        .bind(index as i32 + 1)
        .bind(&episode.title)
        .bind(&episode.url)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(anime_id)
}

pub async fn find_anime(pool: &PgPool, id: Uuid) -> RepositoryResult<Option<Anime>> {
    let row = sqlx::query(&format!("SELECT {} FROM animes WHERE id = $1", ANIME_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(anime_from_row))
}

/// One page of the catalog plus the total match count
///
/// Search is a case-insensitive substring match on the title.
pub async fn list_anime(pool: &PgPool, filter: &CatalogFilter) -> RepositoryResult<(Vec<Anime>, i64)> {
    const WHERE: &str = "($1::text IS NULL OR position(lower($1) in lower(title)) > 0)
         AND ($2::text IS NULL OR category = $2)";

    let rows = sqlx::query(&format!(
        "SELECT {} FROM animes WHERE {} ORDER BY created_at DESC, id LIMIT $3 OFFSET $4",
        ANIME_COLUMNS, WHERE
    ))
    .bind(&filter.search)
    .bind(&filter.category)
    .bind(filter.per_page as i64)
    .bind(filter.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS count FROM animes WHERE {}", WHERE))
        .bind(&filter.search)
        .bind(&filter.category)
        .fetch_one(pool)
        .await?
        .get("count");

    Ok((rows.iter().map(anime_from_row).collect(), total))
}

/// Home feed: newest first, only records with a title and an image
pub async fn latest_anime(pool: &PgPool, limit: i64) -> RepositoryResult<Vec<Anime>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM animes
         WHERE btrim(title) <> '' AND btrim(image) <> ''
         ORDER BY created_at DESC
         LIMIT $1",
        ANIME_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(anime_from_row).collect())
}

pub async fn featured_anime(pool: &PgPool) -> RepositoryResult<Vec<Anime>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM animes WHERE featured ORDER BY created_at DESC",
        ANIME_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(anime_from_row).collect())
}

pub async fn set_featured(pool: &PgPool, id: Uuid, featured: bool) -> RepositoryResult<Anime> {
    let row = sqlx::query(&format!(
        "UPDATE animes SET featured = $1 WHERE id = $2 RETURNING {}",
        ANIME_COLUMNS
    ))
    .bind(featured)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref()
        .map(anime_from_row)
        .ok_or_else(|| RepositoryError::NotFound("Anime".to_string()))
}

/// Delete an anime; its episodes and favorites go with it
pub async fn delete_anime(pool: &PgPool, id: Uuid) -> RepositoryResult<()> {
    let result = sqlx::query("DELETE FROM animes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound("Anime".to_string()));
    }
    Ok(())
}

pub async fn count_anime(pool: &PgPool) -> RepositoryResult<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM animes")
        .fetch_one(pool)
        .await?;
    Ok(row.get("count"))
}

// ============================================================================
// Episodes
// ============================================================================

const EPISODE_COLUMNS: &str = "id, anime_id, number, title, video_url, duration, created_at";

fn episode_from_row(row: &PgRow) -> Episode {
    Episode {
        id: row.get("id"),
        anime_id: row.get("anime_id"),
        number: row.get("number"),
        title: row.get("title"),
        video_url: row.get("video_url"),
        duration: row.get("duration"),
        created_at: timestamp(row, "created_at"),
    }
}

pub async fn insert_episode(pool: &PgPool, anime_id: Uuid, episode: &NewEpisode) -> RepositoryResult<Episode> {
    let row = sqlx::query(&format!(
        "INSERT INTO episodes (id, anime_id, number, title, video_url, duration)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {}",
        EPISODE_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(anime_id)
    .bind(episode.number)
    .bind(&episode.title)
    .bind(&episode.video_url)
    .bind(&episode.duration)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            RepositoryError::NotFound("Anime".to_string())
        } else {
            RepositoryError::DatabaseError(e)
        }
    })?;

    Ok(episode_from_row(&row))
}

/// Episodes of an anime ordered by number
pub async fn list_episodes(pool: &PgPool, anime_id: Uuid) -> RepositoryResult<Vec<Episode>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM episodes WHERE anime_id = $1 ORDER BY number ASC, created_at ASC",
        EPISODE_COLUMNS
    ))
    .bind(anime_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(episode_from_row).collect())
}

pub async fn find_episode(pool: &PgPool, anime_id: Uuid, episode_id: Uuid) -> RepositoryResult<Option<Episode>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM episodes WHERE anime_id = $1 AND id = $2",
        EPISODE_COLUMNS
    ))
    .bind(anime_id)
    .bind(episode_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(episode_from_row))
}

pub async fn update_episode(
    pool: &PgPool,
    anime_id: Uuid,
    episode_id: Uuid,
    episode: &NewEpisode,
) -> RepositoryResult<Episode> {
    let row = sqlx::query(&format!(
        "UPDATE episodes SET number = $1, title = $2, video_url = $3, duration = $4
         WHERE anime_id = $5 AND id = $6
         RETURNING {}",
        EPISODE_COLUMNS
    ))
    .bind(episode.number)
    .bind(&episode.title)
    .bind(&episode.video_url)
    .bind(&episode.duration)
    .bind(anime_id)
    .bind(episode_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref()
        .map(episode_from_row)
        .ok_or_else(|| RepositoryError::NotFound("Episode".to_string()))
}

pub async fn delete_episode(pool: &PgPool, anime_id: Uuid, episode_id: Uuid) -> RepositoryResult<()> {
    let result = sqlx::query("DELETE FROM episodes WHERE anime_id = $1 AND id = $2")
        .bind(anime_id)
        .bind(episode_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound("Episode".to_string()));
    }
    Ok(())
}

// ============================================================================
// Favorites
// ============================================================================

pub async fn add_favorite(pool: &PgPool, user_id: i32, anime_id: Uuid) -> RepositoryResult<UserFavorite> {
    sqlx::query("INSERT INTO user_favorites (user_id, anime_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(anime_id)
        .execute(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Conflict("Anime already in favorites".to_string())
            } else if is_foreign_key_violation(&e) {
                RepositoryError::NotFound("Anime".to_string())
            } else {
                RepositoryError::DatabaseError(e)
            }
        })?;

    get_favorites(pool, user_id)
        .await?
        .into_iter()
        .find(|f| f.anime_id == anime_id)
        .ok_or_else(|| RepositoryError::NotFound("Favorite".to_string()))
}

/// Favorites of a user, most recently added first
pub async fn get_favorites(pool: &PgPool, user_id: i32) -> RepositoryResult<Vec<UserFavorite>> {
    let rows = sqlx::query(
        r#"
        SELECT f.anime_id, a.title, a.image, f.created_at
        FROM user_favorites f
        JOIN animes a ON a.id = f.anime_id
        WHERE f.user_id = $1
        ORDER BY f.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| UserFavorite {
            anime_id: row.get("anime_id"),
            title: row.get("title"),
            image: row.get("image"),
            created_at: timestamp(row, "created_at"),
        })
        .collect())
}

pub async fn remove_favorite(pool: &PgPool, user_id: i32, anime_id: Uuid) -> RepositoryResult<()> {
    let result = sqlx::query("DELETE FROM user_favorites WHERE user_id = $1 AND anime_id = $2")
        .bind(user_id)
        .bind(anime_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound("Favorite".to_string()));
    }
    Ok(())
}

// ============================================================================
// Settings
// ============================================================================

/// Load a user's settings, defaults when nothing is stored yet
pub async fn load_settings(pool: &PgPool, user_id: i32) -> RepositoryResult<Settings> {
    let row = sqlx::query("SELECT blob FROM user_settings WHERE user_id = $1 AND storage_key = $2")
        .bind(user_id)
        .bind(SETTINGS_KEY)
        .fetch_optional(pool)
        .await?;

    Ok(row
        .map(|r| Settings::from_blob(r.get::<&str, _>("blob")))
        .unwrap_or_default())
}

/// Persist the whole settings blob
pub async fn save_settings(pool: &PgPool, user_id: i32, settings: &Settings) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO user_settings (user_id, storage_key, blob, updated_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (user_id, storage_key) DO UPDATE SET
            blob = EXCLUDED.blob,
            updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(SETTINGS_KEY)
    .bind(settings.to_blob())
    .execute(pool)
    .await?;
    Ok(())
}
