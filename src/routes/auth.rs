//! Authentication routes for the AnimeFlow API
//!
//! - POST /api/auth/register - Register with email/password
//! - POST /api/auth/login - Login with email/password
//! - POST /api/auth/google - Login with a Google ID token
//! - POST /api/auth/logout - Logout (clears HTTP-only cookie)
//! - GET /api/auth/me - Auth-state check for the current session
//! - PUT /api/auth/me - Edit the caller's own profile

use actix_web::{web, HttpResponse, Responder, ResponseError};
use tracing::{error, info, warn};

use crate::auth::{
    create_auth_cookie, create_logout_cookie, ensure_active, generate_token, hash_password,
    verify_google_token, verify_password, Auth, AuthError,
};
use crate::constants::MIN_PASSWORD_LENGTH;
use crate::db::{
    create_google_user, create_user, find_user_by_email, find_user_by_google_id,
    link_google_account, update_user_name, RepositoryError,
};
use crate::error::AppError;
use crate::models::{
    ApiError, ApiResponse, AuthData, AuthResponse, GoogleAuthRequest, LoginRequest,
    RegisterRequest, UpdateProfileRequest, User,
};
use crate::roles::{authorize_user_action, Subject, UserAction};
use crate::routes::AppState;

/// Basic shape check: one `@`, non-empty local part, dotted domain
fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let (local, domain) = (parts[0], parts[1]);

    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return false;
    }

    !domain.split('.').any(|p| p.is_empty())
}

fn banned_response() -> HttpResponse {
    AppError::Auth(AuthError::AccountBanned).error_response()
}

/// Issue a token and cookie for a signed-in user
fn session_response(data: &AppState, user: User) -> HttpResponse {
    let token = match generate_token(user.id, &data.config.jwt_secret) {
        Ok(token) => token,
        Err(e) => {
            error!("Failed to generate token: {}", e);
            return HttpResponse::InternalServerError()
                .json(ApiError::new("Failed to generate authentication token"));
        }
    };

    HttpResponse::Ok()
        .cookie(create_auth_cookie(&token))
        .json(AuthResponse {
            success: true,
            data: AuthData { user, token },
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
}

/// POST /api/auth/register - Register a new user with email and password
///
/// New accounts start with role `user` and are not banned.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registration successful", body = AuthResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 409, description = "Email already exists", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn register(
    data: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> impl Responder {
    let email = body.email.trim();

    if !is_valid_email(email) {
        return HttpResponse::BadRequest().json(ApiError::new("Invalid email format"));
    }

    if body.password.chars().count() < MIN_PASSWORD_LENGTH {
        return HttpResponse::BadRequest().json(ApiError::new(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let password_hash = match hash_password(&body.password) {
        Ok(hash) => hash,
        Err(e) => {
            error!("Failed to hash password: {}", e);
            return HttpResponse::InternalServerError()
                .json(ApiError::new("Failed to process registration"));
        }
    };

    let name = body.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let user = match create_user(data.db.pool(), email, &password_hash, name).await {
        Ok(user) => user,
        Err(RepositoryError::EmailAlreadyExists) => {
            return HttpResponse::Conflict().json(ApiError::new("Email already exists"));
        }
        Err(e) => {
            error!("Failed to create user: {}", e);
            return HttpResponse::InternalServerError()
                .json(ApiError::new("Failed to create user"));
        }
    };

    info!("User registered: {}", user.email);
    let user = user.with_effective_role(data.config.owner_email.as_deref());
    session_response(&data, user)
}

/// POST /api/auth/login - Login with email and password
///
/// Banned accounts are refused and receive no token.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Invalid credentials", body = ApiError),
        (status = 403, description = "Account banned", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn login(data: web::Data<AppState>, body: web::Json<LoginRequest>) -> impl Responder {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return HttpResponse::BadRequest().json(ApiError::new("Email and password are required"));
    }

    let (user, password_hash) = match find_user_by_email(data.db.pool(), body.email.trim()).await {
        Ok(Some((user, Some(hash)))) => (user, hash),
        // Unknown email and Google-only accounts look the same to the caller
        Ok(_) => {
            return AppError::Auth(AuthError::InvalidCredentials).error_response();
        }
        Err(e) => {
            error!("Failed to find user: {}", e);
            return HttpResponse::InternalServerError()
                .json(ApiError::new("Failed to process login"));
        }
    };

    match verify_password(&body.password, &password_hash) {
        Ok(true) => {}
        Ok(false) => {
            return AppError::Auth(AuthError::InvalidCredentials).error_response();
        }
        Err(e) => {
            error!("Failed to verify password: {}", e);
            return HttpResponse::InternalServerError()
                .json(ApiError::new("Failed to process login"));
        }
    }

    if ensure_active(&user).is_err() {
        warn!("Banned user attempted login: {}", user.email);
        return banned_response();
    }

    info!("User logged in: {}", user.email);
    let user = user.with_effective_role(data.config.owner_email.as_deref());
    session_response(&data, user)
}

/// POST /api/auth/google - Login or register with a Google ID token
///
/// Existing accounts with the same email are linked to the Google identity.
#[utoipa::path(
    post,
    path = "/api/auth/google",
    tag = "auth",
    request_body = GoogleAuthRequest,
    responses(
        (status = 200, description = "Authentication successful", body = AuthResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 403, description = "Account banned", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn google_auth(
    data: web::Data<AppState>,
    body: web::Json<GoogleAuthRequest>,
) -> impl Responder {
    let pool = data.db.pool();

    let google_client_id = match &data.config.google_client_id {
        Some(id) => id,
        None => {
            return HttpResponse::BadRequest()
                .json(ApiError::new("Google OAuth is not configured"));
        }
    };

    if body.id_token.is_empty() {
        return HttpResponse::BadRequest().json(ApiError::new("ID token is required"));
    }

    let google = match verify_google_token(&body.id_token, google_client_id).await {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Google token verification failed: {}", e);
            return HttpResponse::BadRequest().json(ApiError::new("Invalid Google ID token"));
        }
    };

    let existing = match find_user_by_google_id(pool, &google.sub).await {
        Ok(found) => found,
        Err(e) => {
            error!("Failed to find user by Google ID: {}", e);
            return HttpResponse::InternalServerError()
                .json(ApiError::new("Failed to process authentication"));
        }
    };

    let user = match existing {
        Some(user) => user,
        None => match find_user_by_email(pool, &google.email).await {
            Ok(Some((user, _))) => {
                if let Err(e) = link_google_account(pool, user.id, &google.sub).await {
                    error!("Failed to link Google account: {}", e);
                    return HttpResponse::InternalServerError()
                        .json(ApiError::new("Failed to link Google account"));
                }
                info!("Linked Google account to existing user: {}", user.email);
                user
            }
            Ok(None) => {
                let name = google.name.as_deref().unwrap_or(&google.email);
                match create_google_user(pool, &google.email, &google.sub, name, google.picture.as_deref())
                    .await
                {
                    Ok(user) => {
                        info!("New Google user created: {}", user.email);
                        user
                    }
                    Err(e) => {
                        error!("Failed to create Google user: {}", e);
                        return HttpResponse::InternalServerError()
                            .json(ApiError::new("Failed to create user"));
                    }
                }
            }
            Err(e) => {
                error!("Failed to find user by email: {}", e);
                return HttpResponse::InternalServerError()
                    .json(ApiError::new("Failed to process authentication"));
            }
        },
    };

    if ensure_active(&user).is_err() {
        warn!("Banned user attempted Google login: {}", user.email);
        return banned_response();
    }

    let user = user.with_effective_role(data.config.owner_email.as_deref());
    session_response(&data, user)
}

/// POST /api/auth/logout - Clear the auth cookie
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logout successful", body = ApiResponse<String>)
    )
)]
pub async fn logout() -> impl Responder {
    HttpResponse::Ok()
        .cookie(create_logout_cookie())
        .json(ApiResponse::new("Logged out successfully".to_string()))
}

/// GET /api/auth/me - Auth-state check
///
/// Returns the signed-in account with its effective role. A banned account
/// gets 403 and its cookie is cleared, which signs it out.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Current user info", body = ApiResponse<User>),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Account banned", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn me(data: web::Data<AppState>, auth: Auth) -> Result<HttpResponse, AppError> {
    let user = data.current_user(&auth).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(user)))
}

/// PUT /api/auth/me - Edit the caller's own profile
///
/// Open to every active account regardless of role.
#[utoipa::path(
    put,
    path = "/api/auth/me",
    tag = "auth",
    request_body = UpdateProfileRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Updated user", body = ApiResponse<User>),
        (status = 400, description = "Invalid name", body = ApiError),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Account banned", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn update_me(
    data: web::Data<AppState>,
    auth: Auth,
    body: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, AppError> {
    let user = data.current_user(&auth).await?;
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Name cannot be empty"));
    }

    let me = Subject::new(user.id, user.role);
    authorize_user_action(me, me, UserAction::EditProfile)?;

    let updated = update_user_name(data.db.pool(), user.id, name).await?;
    info!("User {} renamed themselves", user.id);
    Ok(HttpResponse::Ok().json(ApiResponse::new(
        updated.with_effective_role(data.config.owner_email.as_deref()),
    )))
}

/// Configure authentication routes
pub fn configure_auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/google", web::post().to(google_auth))
            .route("/logout", web::post().to(logout))
            .route("/me", web::get().to(me))
            .route("/me", web::put().to(update_me)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_is_valid_email_valid() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("user.name@domain.co.uk"));
        assert!(is_valid_email("user+tag@example.org"));
        assert!(is_valid_email("a@b.co"));
    }

    #[test]
    fn test_is_valid_email_invalid() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("invalid"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("test@"));
        assert!(!is_valid_email("test@.com"));
        assert!(!is_valid_email("test@example"));
        assert!(!is_valid_email("test@@example.com"));
        assert!(!is_valid_email("test@example..com"));
    }

    #[test]
    fn test_banned_response_signs_out() {
        let response = banned_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response
            .cookies()
            .any(|c| c.name() == crate::auth::AUTH_COOKIE_NAME && c.value().is_empty()));
    }
}
