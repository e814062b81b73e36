//! User routes for the AnimeFlow API
//!
//! Endpoints that act on the signed-in account:
//! - POST /api/favorites - Add anime to favorites
//! - GET /api/favorites - Get user's favorites
//! - DELETE /api/favorites/{animeId} - Remove from favorites
//! - GET /api/settings - Load settings (defaults when nothing is stored)
//! - PUT /api/settings - Apply a partial settings update

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Auth;
use crate::db::{add_favorite, get_favorites, load_settings, remove_favorite, save_settings};
use crate::error::AppResult;
use crate::models::{ApiError, ApiResponse, UserFavorite};
use crate::routes::AppState;
use crate::settings::{Settings, SettingsPatch};

/// Request body for adding a favorite
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddFavoriteRequest {
    /// Catalog id of the anime
    pub anime_id: Uuid,
}

/// POST /api/favorites - Add an anime to user's favorites
///
/// # Responses
/// - 200: Favorite added successfully
/// - 401: Not authenticated
/// - 403: Account banned
/// - 404: Anime does not exist
/// - 409: Anime already in favorites
#[utoipa::path(
    post,
    path = "/api/favorites",
    tag = "user",
    request_body = AddFavoriteRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Favorite added successfully", body = ApiResponse<UserFavorite>),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Account banned", body = ApiError),
        (status = 404, description = "Anime not found", body = ApiError),
        (status = 409, description = "Already in favorites", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn add_favorite_handler(
    data: web::Data<AppState>,
    auth: Auth,
    body: web::Json<AddFavoriteRequest>,
) -> AppResult<HttpResponse> {
    let user = data.current_user(&auth).await?;
    let favorite = add_favorite(data.db.pool(), user.id, body.anime_id).await?;

    info!("User {} added favorite: {}", user.id, body.anime_id);
    Ok(HttpResponse::Ok().json(ApiResponse::new(favorite)))
}

/// GET /api/favorites - Get user's favorite anime list, newest first
#[utoipa::path(
    get,
    path = "/api/favorites",
    tag = "user",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "List of favorites", body = ApiResponse<Vec<UserFavorite>>),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Account banned", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn get_favorites_handler(
    data: web::Data<AppState>,
    auth: Auth,
) -> AppResult<HttpResponse> {
    let user = data.current_user(&auth).await?;
    let favorites = get_favorites(data.db.pool(), user.id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(favorites)))
}

/// DELETE /api/favorites/{animeId} - Remove an anime from favorites
#[utoipa::path(
    delete,
    path = "/api/favorites/{anime_id}",
    tag = "user",
    params(
        ("anime_id" = Uuid, Path, description = "Catalog id of the anime")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Favorite removed", body = ApiResponse<String>),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Account banned", body = ApiError),
        (status = 404, description = "Favorite not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn remove_favorite_handler(
    data: web::Data<AppState>,
    auth: Auth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let user = data.current_user(&auth).await?;
    let anime_id = path.into_inner();
    remove_favorite(data.db.pool(), user.id, anime_id).await?;

    info!("User {} removed favorite: {}", user.id, anime_id);
    Ok(HttpResponse::Ok().json(ApiResponse::new("Favorite removed".to_string())))
}

/// GET /api/settings - Load the caller's settings
///
/// Missing or malformed stored fields come back as their defaults.
#[utoipa::path(
    get,
    path = "/api/settings",
    tag = "user",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Current settings", body = ApiResponse<Settings>),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Account banned", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn get_settings_handler(
    data: web::Data<AppState>,
    auth: Auth,
) -> AppResult<HttpResponse> {
    let user = data.current_user(&auth).await?;
    let settings = load_settings(data.db.pool(), user.id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(settings)))
}

/// PUT /api/settings - Merge a partial update into the stored settings
#[utoipa::path(
    put,
    path = "/api/settings",
    tag = "user",
    request_body = SettingsPatch,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Updated settings", body = ApiResponse<Settings>),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Account banned", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn update_settings_handler(
    data: web::Data<AppState>,
    auth: Auth,
    body: web::Json<SettingsPatch>,
) -> AppResult<HttpResponse> {
    let user = data.current_user(&auth).await?;
    let pool = data.db.pool();

    let mut settings = load_settings(pool, user.id).await?;
    settings.apply(body.into_inner());
    save_settings(pool, user.id, &settings).await?;

    info!("User {} updated settings", user.id);
    Ok(HttpResponse::Ok().json(ApiResponse::new(settings)))
}

/// Configure user routes (mounted inside `/api`)
pub fn configure_user_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/favorites", web::post().to(add_favorite_handler))
        .route("/favorites", web::get().to(get_favorites_handler))
        .route(
            "/favorites/{anime_id}",
            web::delete().to(remove_favorite_handler),
        )
        .route("/settings", web::get().to(get_settings_handler))
        .route("/settings", web::put().to(update_settings_handler));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_favorite_request_uses_camel_case() {
        let body: AddFavoriteRequest =
            serde_json::from_str(r#"{"animeId":"67e55044-10b1-426f-9247-bb680e5fe0c8"}"#).unwrap();
        assert_eq!(
            body.anime_id.to_string(),
            "67e55044-10b1-426f-9247-bb680e5fe0c8"
        );
    }

    #[test]
    fn test_add_favorite_request_rejects_bad_id() {
        let parsed = serde_json::from_str::<AddFavoriteRequest>(r#"{"animeId":"naruto"}"#);
        assert!(parsed.is_err());
    }
}
