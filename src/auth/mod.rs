//! Authentication module for the AnimeFlow API
//!
//! This module provides:
//! - Password hashing with bcrypt
//! - JWT issue and verification
//! - Google ID token verification
//! - The `Auth` request extractor for protected routes
//! - HTTP-only cookie handling
//! - Account state checks (banned accounts are signed out)

use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::{web, FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use thiserror::Error;

use crate::error::AppError;
use crate::models::User;

/// bcrypt cost factor
const BCRYPT_COST: u32 = 12;

/// JWT token expiry duration in days
const JWT_EXPIRY_DAYS: i64 = 7;

/// Cookie name for JWT token
pub const AUTH_COOKIE_NAME: &str = "auth_token";

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password hashing failed: {0}")]
    HashingError(String),

    #[error("Token generation failed: {0}")]
    TokenGenerationError(String),

    #[error("Token verification failed: {0}")]
    TokenVerificationError(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Missing authorization header")]
    MissingAuthHeader,

    #[error("Invalid authorization header format")]
    InvalidAuthHeaderFormat,

    #[error("Google OAuth verification failed: {0}")]
    GoogleOAuthError(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Account banned")]
    AccountBanned,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: i32,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
}

/// Fields of Google's tokeninfo response we rely on
#[derive(Debug, Deserialize)]
pub struct GoogleTokenPayload {
    /// Google user ID
    pub sub: String,
    pub email: String,
    /// tokeninfo sends this as the string "true"; ID token claims send a bool
    #[serde(default, deserialize_with = "flexible_bool")]
    pub email_verified: Option<bool>,
    /// Audience, must equal our client ID
    pub aud: String,
    /// Issuer
    pub iss: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

fn flexible_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Bool(b)) => Some(b),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

/// Whether an account may keep using the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    Active,
    Banned,
}

/// Auth-state check run on every authenticated request
pub fn account_state(user: &User) -> AccountState {
    if user.banned {
        AccountState::Banned
    } else {
        AccountState::Active
    }
}

/// Fail with [`AuthError::AccountBanned`] for banned accounts
pub fn ensure_active(user: &User) -> Result<(), AuthError> {
    match account_state(user) {
        AccountState::Active => Ok(()),
        AccountState::Banned => Err(AuthError::AccountBanned),
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    bcrypt::hash(password, BCRYPT_COST).map_err(|e| AuthError::HashingError(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, hash).map_err(|e| AuthError::HashingError(e.to_string()))
}

/// Generate a JWT for a user, valid for seven days
pub fn generate_token(user_id: i32, secret: &str) -> Result<String, AuthError> {
    let now = Utc::now();
    let expiry = now + Duration::days(JWT_EXPIRY_DAYS);

    let claims = Claims {
        sub: user_id,
        exp: expiry.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::TokenGenerationError(e.to_string()))
}

/// Verify and decode a JWT
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data: TokenData<Claims> = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenVerificationError(e.to_string()),
    })?;

    Ok(token_data.claims)
}

// ============================================================================
// HTTP-Only Cookie Management
// ============================================================================

fn session_cookie(value: String, max_age: CookieDuration) -> Cookie<'static> {
    let mut cookie = Cookie::new(AUTH_COOKIE_NAME, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(max_age);
    cookie
}

/// HTTP-only, Secure, SameSite=Lax cookie holding the JWT
pub fn create_auth_cookie(token: &str) -> Cookie<'static> {
    session_cookie(token.to_string(), CookieDuration::days(JWT_EXPIRY_DAYS))
}

/// Expired cookie; sending it signs the browser out
pub fn create_logout_cookie() -> Cookie<'static> {
    session_cookie(String::new(), CookieDuration::ZERO)
}

pub fn extract_token_from_cookie(req: &HttpRequest) -> Option<String> {
    req.cookie(AUTH_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Verify a Google ID token through the tokeninfo endpoint
///
/// The audience must match our client ID, the issuer must be Google and
/// the email must be verified.
pub async fn verify_google_token(
    id_token: &str,
    client_id: &str,
) -> Result<GoogleTokenPayload, AuthError> {
    let client = reqwest::Client::new();
    let response = client
        .get("https://oauth2.googleapis.com/tokeninfo")
        .query(&[("id_token", id_token)])
        .send()
        .await
        .map_err(|e| AuthError::GoogleOAuthError(format!("Request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(AuthError::GoogleOAuthError("Invalid token".to_string()));
    }

    let payload: GoogleTokenPayload = response
        .json()
        .await
        .map_err(|e| AuthError::GoogleOAuthError(format!("Failed to parse response: {}", e)))?;

    check_google_claims(&payload, client_id)?;
    Ok(payload)
}

fn check_google_claims(payload: &GoogleTokenPayload, client_id: &str) -> Result<(), AuthError> {
    if payload.aud != client_id {
        return Err(AuthError::GoogleOAuthError("Audience mismatch".to_string()));
    }
    if !GOOGLE_ISSUERS.contains(&payload.iss.as_str()) {
        return Err(AuthError::GoogleOAuthError("Unexpected issuer".to_string()));
    }
    // Linking by email is only safe once Google has verified the address
    if payload.email_verified != Some(true) {
        return Err(AuthError::GoogleOAuthError("Email not verified".to_string()));
    }
    Ok(())
}

/// Extract JWT token from an `Authorization: Bearer <token>` header
pub fn extract_token_from_header(auth_header: &str) -> Result<&str, AuthError> {
    match auth_header.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::InvalidAuthHeaderFormat),
    }
}

/// Resolve the user ID of a request
///
/// A present Authorization header wins over the auth cookie.
pub fn validate_http_request(req: &HttpRequest, secret: &str) -> Result<i32, AuthError> {
    let header = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match header {
        Some(value) => extract_token_from_header(value)?.to_string(),
        None => extract_token_from_cookie(req).ok_or(AuthError::MissingAuthHeader)?,
    };

    verify_token(&token, secret).map(|claims| claims.sub)
}

/// Configuration for the auth extractor
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Authenticated user extractor
///
/// Only proves the token is valid. Handlers still load the account and run
/// [`ensure_active`] so that bans take effect immediately.
#[derive(Debug, Clone)]
pub struct Auth {
    pub user_id: i32,
}

impl FromRequest for Auth {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let result = match req.app_data::<web::Data<AuthConfig>>() {
            Some(config) => validate_http_request(req, &config.jwt_secret)
                .map(|user_id| Auth { user_id })
                .map_err(AppError::from),
            None => Err(AppError::internal("Auth configuration not found")),
        };

        ready(result)
    }
}
