//! Staff dashboard routes for the AnimeFlow API
//!
//! Every handler loads the caller, then checks the role policy before it
//! touches the database. Catalog management needs dashboard access,
//! account changes go through [`authorize_user_action`] and the crawler
//! needs admin or higher.

use actix_web::{web, HttpResponse};
use tracing::info;
use uuid::Uuid;

use crate::auth::Auth;
use crate::crawler::{run_crawl, CrawlOptions, CrawlReport};
use crate::db::{
    count_anime, count_users, delete_anime, delete_episode, delete_user, find_episode,
    find_user_by_id, insert_anime, insert_episode, list_users, set_featured, set_user_banned,
    set_user_role, update_episode, update_user_fields,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    Anime, ApiError, ApiResponse, BanRequest, CreateAnimeRequest, CreateEpisodeRequest, Episode,
    FeaturedRequest, StatsResponse, UpdateEpisodeRequest, UpdateRoleRequest, UpdateUserRequest,
    User,
};
use crate::roles::{
    authorize_user_action, require_crawler, require_dashboard, Role, Subject, UserAction,
};
use crate::routes::{load_anime, AppState};
use crate::scraper::{Scraper, ScraperConfig};

/// Load the caller and make sure they may open the dashboard
async fn dashboard_user(data: &AppState, auth: &Auth) -> AppResult<User> {
    let user = data.current_user(auth).await?;
    require_dashboard(user.role)?;
    Ok(user)
}

/// Load the account an action targets, with the owner override applied
async fn target_user(data: &AppState, id: i32) -> AppResult<User> {
    find_user_by_id(data.db.pool(), id)
        .await?
        .map(|u| u.with_effective_role(data.config.owner_email.as_deref()))
        .ok_or_else(|| AppError::not_found("User not found"))
}

fn parse_role(raw: &str) -> AppResult<Role> {
    Role::parse_strict(raw).ok_or_else(|| AppError::validation(format!("Unknown role: {}", raw)))
}

fn subject(user: &User) -> Subject {
    Subject::new(user.id, user.role)
}

fn ban_action(banned: bool) -> UserAction {
    if banned {
        UserAction::Ban
    } else {
        UserAction::Unban
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// GET /api/admin/stats - Catalog and account counts
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Dashboard statistics", body = ApiResponse<StatsResponse>),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "No dashboard access", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn stats_handler(data: web::Data<AppState>, auth: Auth) -> AppResult<HttpResponse> {
    dashboard_user(&data, &auth).await?;
    let pool = data.db.pool();

    let stats = StatsResponse {
        animes: count_anime(pool).await?,
        users: count_users(pool).await?,
    };
    Ok(HttpResponse::Ok().json(ApiResponse::new(stats)))
}

/// POST /api/admin/anime - Add an anime to the catalog
///
/// Title, description and image are required. Category defaults to
/// `Action`, rating to `PG-13`; tags may be a list or a comma separated
/// string.
#[utoipa::path(
    post,
    path = "/api/admin/anime",
    tag = "admin",
    request_body = CreateAnimeRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Anime created", body = ApiResponse<Anime>),
        (status = 400, description = "Missing required fields", body = ApiError),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "No dashboard access", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn create_anime_handler(
    data: web::Data<AppState>,
    auth: Auth,
    body: web::Json<CreateAnimeRequest>,
) -> AppResult<HttpResponse> {
    let user = dashboard_user(&data, &auth).await?;
    let new_anime = body.into_inner().validate().map_err(AppError::Validation)?;

    let anime = insert_anime(data.db.pool(), &new_anime).await?;
    info!("User {} added anime: {}", user.id, anime.title);
    Ok(HttpResponse::Created().json(ApiResponse::new(anime)))
}

/// PATCH /api/admin/anime/{id}/featured - Toggle the featured flag
#[utoipa::path(
    patch,
    path = "/api/admin/anime/{id}/featured",
    tag = "admin",
    params(
        ("id" = Uuid, Path, description = "Anime id")
    ),
    request_body = FeaturedRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Anime updated", body = ApiResponse<Anime>),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "No dashboard access", body = ApiError),
        (status = 404, description = "Anime not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn set_featured_handler(
    data: web::Data<AppState>,
    auth: Auth,
    path: web::Path<Uuid>,
    body: web::Json<FeaturedRequest>,
) -> AppResult<HttpResponse> {
    dashboard_user(&data, &auth).await?;
    let anime = set_featured(data.db.pool(), path.into_inner(), body.featured).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(anime)))
}

/// DELETE /api/admin/anime/{id} - Remove an anime with its episodes
#[utoipa::path(
    delete,
    path = "/api/admin/anime/{id}",
    tag = "admin",
    params(
        ("id" = Uuid, Path, description = "Anime id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Anime deleted", body = ApiResponse<String>),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "No dashboard access", body = ApiError),
        (status = 404, description = "Anime not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn delete_anime_handler(
    data: web::Data<AppState>,
    auth: Auth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let user = dashboard_user(&data, &auth).await?;
    let id = path.into_inner();
    delete_anime(data.db.pool(), id).await?;

    info!("User {} deleted anime {}", user.id, id);
    Ok(HttpResponse::Ok().json(ApiResponse::new("Anime deleted".to_string())))
}

/// POST /api/admin/anime/{id}/episodes - Add an episode
#[utoipa::path(
    post,
    path = "/api/admin/anime/{id}/episodes",
    tag = "admin",
    params(
        ("id" = Uuid, Path, description = "Anime id")
    ),
    request_body = CreateEpisodeRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Episode created", body = ApiResponse<Episode>),
        (status = 400, description = "Missing required fields", body = ApiError),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "No dashboard access", body = ApiError),
        (status = 404, description = "Anime not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn create_episode_handler(
    data: web::Data<AppState>,
    auth: Auth,
    path: web::Path<Uuid>,
    body: web::Json<CreateEpisodeRequest>,
) -> AppResult<HttpResponse> {
    dashboard_user(&data, &auth).await?;
    let new_episode = body.into_inner().validate().map_err(AppError::Validation)?;
    let anime = load_anime(&data, path.into_inner()).await?;

    let episode = insert_episode(data.db.pool(), anime.id, &new_episode).await?;
    Ok(HttpResponse::Created().json(ApiResponse::new(episode)))
}

/// PUT /api/admin/anime/{id}/episodes/{episode_id} - Edit an episode
///
/// Fields left out of the body keep their current value.
#[utoipa::path(
    put,
    path = "/api/admin/anime/{id}/episodes/{episode_id}",
    tag = "admin",
    params(
        ("id" = Uuid, Path, description = "Anime id"),
        ("episode_id" = Uuid, Path, description = "Episode id")
    ),
    request_body = UpdateEpisodeRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Episode updated", body = ApiResponse<Episode>),
        (status = 400, description = "Invalid fields", body = ApiError),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "No dashboard access", body = ApiError),
        (status = 404, description = "Episode not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn update_episode_handler(
    data: web::Data<AppState>,
    auth: Auth,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Json<UpdateEpisodeRequest>,
) -> AppResult<HttpResponse> {
    dashboard_user(&data, &auth).await?;
    let (anime_id, episode_id) = path.into_inner();
    let pool = data.db.pool();

    let current = find_episode(pool, anime_id, episode_id)
        .await?
        .ok_or_else(|| AppError::not_found("Episode not found"))?;
    let merged = body.into_inner().apply_to(&current).map_err(AppError::Validation)?;

    let episode = update_episode(pool, anime_id, episode_id, &merged).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(episode)))
}

/// DELETE /api/admin/anime/{id}/episodes/{episode_id} - Remove an episode
#[utoipa::path(
    delete,
    path = "/api/admin/anime/{id}/episodes/{episode_id}",
    tag = "admin",
    params(
        ("id" = Uuid, Path, description = "Anime id"),
        ("episode_id" = Uuid, Path, description = "Episode id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Episode deleted", body = ApiResponse<String>),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "No dashboard access", body = ApiError),
        (status = 404, description = "Episode not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn delete_episode_handler(
    data: web::Data<AppState>,
    auth: Auth,
    path: web::Path<(Uuid, Uuid)>,
) -> AppResult<HttpResponse> {
    dashboard_user(&data, &auth).await?;
    let (anime_id, episode_id) = path.into_inner();
    delete_episode(data.db.pool(), anime_id, episode_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("Episode deleted".to_string())))
}

// ============================================================================
// Users
// ============================================================================

/// GET /api/admin/users - All accounts, newest first
#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "All users", body = ApiResponse<Vec<User>>),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "No dashboard access", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn list_users_handler(data: web::Data<AppState>, auth: Auth) -> AppResult<HttpResponse> {
    dashboard_user(&data, &auth).await?;
    let owner_email = data.config.owner_email.as_deref();

    let users: Vec<User> = list_users(data.db.pool())
        .await?
        .into_iter()
        .map(|u| u.with_effective_role(owner_email))
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::new(users)))
}

/// PUT /api/admin/users/{id}/role - Change a user's role (owner only)
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    tag = "admin",
    params(
        ("id" = i32, Path, description = "User id")
    ),
    request_body = UpdateRoleRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Role updated", body = ApiResponse<User>),
        (status = 400, description = "Unknown role", body = ApiError),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Not allowed", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn update_role_handler(
    data: web::Data<AppState>,
    auth: Auth,
    path: web::Path<i32>,
    body: web::Json<UpdateRoleRequest>,
) -> AppResult<HttpResponse> {
    let actor = dashboard_user(&data, &auth).await?;
    let role = parse_role(&body.role)?;
    let target = target_user(&data, path.into_inner()).await?;

    authorize_user_action(subject(&actor), subject(&target), UserAction::ChangeRole(role))?;

    let updated = set_user_role(data.db.pool(), target.id, role).await?;
    info!("User {} set role of {} to {}", actor.id, target.id, role);
    Ok(HttpResponse::Ok().json(ApiResponse::new(
        updated.with_effective_role(data.config.owner_email.as_deref()),
    )))
}

/// PUT /api/admin/users/{id}/ban - Ban or unban a user
///
/// The target must rank strictly below the caller.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/ban",
    tag = "admin",
    params(
        ("id" = i32, Path, description = "User id")
    ),
    request_body = BanRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Ban state updated", body = ApiResponse<User>),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Not allowed", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn ban_user_handler(
    data: web::Data<AppState>,
    auth: Auth,
    path: web::Path<i32>,
    body: web::Json<BanRequest>,
) -> AppResult<HttpResponse> {
    let actor = dashboard_user(&data, &auth).await?;
    let target = target_user(&data, path.into_inner()).await?;

    authorize_user_action(subject(&actor), subject(&target), ban_action(body.banned))?;

    let updated = set_user_banned(data.db.pool(), target.id, body.banned).await?;
    info!("User {} set banned={} on {}", actor.id, body.banned, target.id);
    Ok(HttpResponse::Ok().json(ApiResponse::new(
        updated.with_effective_role(data.config.owner_email.as_deref()),
    )))
}

/// PUT /api/admin/users/{id} - Edit dialog: name, ban state and role
///
/// Each supplied field is authorized on its own. Nothing is written unless
/// every supplied field is allowed, and the write is a single statement.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    tag = "admin",
    params(
        ("id" = i32, Path, description = "User id")
    ),
    request_body = UpdateUserRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "User updated", body = ApiResponse<User>),
        (status = 400, description = "Invalid fields", body = ApiError),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Not allowed", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn update_user_handler(
    data: web::Data<AppState>,
    auth: Auth,
    path: web::Path<i32>,
    body: web::Json<UpdateUserRequest>,
) -> AppResult<HttpResponse> {
    let actor = dashboard_user(&data, &auth).await?;
    let target = target_user(&data, path.into_inner()).await?;
    let body = body.into_inner();
    let (actor_s, target_s) = (subject(&actor), subject(&target));

    let name = match body.name {
        Some(name) if name.trim().is_empty() => {
            return Err(AppError::validation("Name cannot be empty"));
        }
        Some(name) => Some(name.trim().to_string()),
        None => None,
    };
    let role = body.role.as_deref().map(parse_role).transpose()?;

    // Unchanged fields sent back by the dialog need no permission
    let name = name.filter(|n| target.name.as_deref() != Some(n.as_str()));
    let banned = body.banned.filter(|b| *b != target.banned);
    let role = role.filter(|r| *r != target.role);

    if name.is_some() {
        authorize_user_action(actor_s, target_s, UserAction::EditProfile)?;
    }
    if let Some(banned) = banned {
        authorize_user_action(actor_s, target_s, ban_action(banned))?;
    }
    if let Some(role) = role {
        authorize_user_action(actor_s, target_s, UserAction::ChangeRole(role))?;
    }

    let updated =
        update_user_fields(data.db.pool(), target.id, name.as_deref(), banned, role).await?;

    info!("User {} edited user {}", actor.id, updated.id);
    Ok(HttpResponse::Ok().json(ApiResponse::new(
        updated.with_effective_role(data.config.owner_email.as_deref()),
    )))
}

/// DELETE /api/admin/users/{id} - Delete an account (owner only)
#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    tag = "admin",
    params(
        ("id" = i32, Path, description = "User id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "User deleted", body = ApiResponse<String>),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Not allowed", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn delete_user_handler(
    data: web::Data<AppState>,
    auth: Auth,
    path: web::Path<i32>,
) -> AppResult<HttpResponse> {
    let actor = dashboard_user(&data, &auth).await?;
    let target = target_user(&data, path.into_inner()).await?;

    authorize_user_action(subject(&actor), subject(&target), UserAction::Delete)?;

    delete_user(data.db.pool(), target.id).await?;
    info!("User {} deleted user {}", actor.id, target.id);
    Ok(HttpResponse::Ok().json(ApiResponse::new("User deleted".to_string())))
}

// ============================================================================
// Crawler
// ============================================================================

/// POST /api/admin/crawler/run - Run one crawl with the server's settings
///
/// Blocks until the crawl is done and returns its report.
#[utoipa::path(
    post,
    path = "/api/admin/crawler/run",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Crawl report", body = ApiResponse<CrawlReport>),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Admin role required", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn run_crawler_handler(
    data: web::Data<AppState>,
    auth: Auth,
) -> AppResult<HttpResponse> {
    let user = data.current_user(&auth).await?;
    require_crawler(user.role)?;

    let crawler = &data.config.crawler;
    let scraper = Scraper::with_config(ScraperConfig::from(crawler))?;
    info!("User {} started a crawl of {}", user.id, crawler.base_url);

    let report = run_crawl(&scraper, &data.db, &CrawlOptions::from(crawler)).await;
    Ok(HttpResponse::Ok().json(ApiResponse::new(report)))
}

/// Configure dashboard routes (mounted inside `/api`)
pub fn configure_admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/stats", web::get().to(stats_handler))
            .route("/anime", web::post().to(create_anime_handler))
            .route("/anime/{id}", web::delete().to(delete_anime_handler))
            .route("/anime/{id}/featured", web::patch().to(set_featured_handler))
            .route("/anime/{id}/episodes", web::post().to(create_episode_handler))
            .route(
                "/anime/{id}/episodes/{episode_id}",
                web::put().to(update_episode_handler),
            )
            .route(
                "/anime/{id}/episodes/{episode_id}",
                web::delete().to(delete_episode_handler),
            )
            .route("/users", web::get().to(list_users_handler))
            .route("/users/{id}", web::put().to(update_user_handler))
            .route("/users/{id}", web::delete().to(delete_user_handler))
            .route("/users/{id}/role", web::put().to(update_role_handler))
            .route("/users/{id}/ban", web::put().to(ban_user_handler))
            .route("/crawler/run", web::post().to(run_crawler_handler)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role_rejects_unknown() {
        assert_eq!(parse_role("moderator").unwrap(), Role::Moderator);
        assert!(matches!(parse_role("superadmin"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_ban_action_follows_flag() {
        assert_eq!(ban_action(true), UserAction::Ban);
        assert_eq!(ban_action(false), UserAction::Unban);
    }
}
