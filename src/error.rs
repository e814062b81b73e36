//! Global error handling module for the AnimeFlow API
//!
//! This module provides a unified error type that handles all application errors
//! and converts them to appropriate HTTP responses with consistent JSON structure.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;
use tracing::error;

use crate::auth::{create_logout_cookie, AuthError};
use crate::db::{DbError, RepositoryError};
use crate::models::ApiError;
use crate::roles::PolicyError;
use crate::scraper::ScraperError;

/// Application-wide error type that unifies all error sources
#[derive(Debug, Error)]
pub enum AppError {
    /// Scraping-related errors (network, HTTP)
    #[error("Scraping error: {0}")]
    Scraping(#[from] ScraperError),

    /// Connection-level database errors
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Query-level database errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Authentication-related errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Role policy denials
    #[error("Permission denied: {0}")]
    Policy(#[from] PolicyError),

    /// Validation errors (bad request)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,

            AppError::Auth(auth_err) => match auth_err {
                AuthError::InvalidCredentials
                | AuthError::TokenExpired
                | AuthError::MissingAuthHeader
                | AuthError::InvalidAuthHeaderFormat
                | AuthError::TokenVerificationError(_)
                | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::AccountBanned => StatusCode::FORBIDDEN,
                AuthError::GoogleOAuthError(_) => StatusCode::BAD_REQUEST,
                AuthError::HashingError(_) | AuthError::TokenGenerationError(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },

            AppError::Policy(_) => StatusCode::FORBIDDEN,

            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Repository(RepositoryError::NotFound(_)) => StatusCode::NOT_FOUND,

            AppError::Repository(RepositoryError::EmailAlreadyExists)
            | AppError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,

            AppError::Scraping(_)
            | AppError::Database(_)
            | AppError::Repository(RepositoryError::DatabaseError(_))
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::Internal(msg) => msg.clone(),

            AppError::Auth(auth_err) => match auth_err {
                AuthError::InvalidCredentials => "Invalid email or password".to_string(),
                AuthError::TokenExpired => "Token has expired, please login again".to_string(),
                AuthError::MissingAuthHeader => "Authorization header is required".to_string(),
                AuthError::InvalidAuthHeaderFormat => {
                    "Invalid authorization header format, expected 'Bearer <token>'".to_string()
                }
                AuthError::TokenVerificationError(_) => "Invalid authentication token".to_string(),
                AuthError::UserNotFound => "User not found".to_string(),
                AuthError::AccountBanned => "Your account has been banned".to_string(),
                AuthError::HashingError(_) => "Authentication processing error".to_string(),
                AuthError::TokenGenerationError(_) => {
                    "Failed to generate authentication token".to_string()
                }
                AuthError::GoogleOAuthError(_) => "Invalid Google ID token".to_string(),
            },

            AppError::Policy(policy_err) => policy_err.to_string(),

            AppError::Repository(repo_err) => match repo_err {
                RepositoryError::NotFound(what) => format!("{} not found", what),
                RepositoryError::EmailAlreadyExists => "Email already exists".to_string(),
                RepositoryError::Conflict(msg) => msg.clone(),
                RepositoryError::DatabaseError(_) => "Database operation failed".to_string(),
            },

            AppError::Scraping(scraper_err) => match scraper_err {
                ScraperError::NetworkError(_) => "Failed to reach the source site".to_string(),
                ScraperError::HttpError(status) => {
                    format!("Source site returned error status: {}", status)
                }
                ScraperError::ResponseError(_) => "Failed to read source response".to_string(),
                ScraperError::ClientError(_) => "Scraper is misconfigured".to_string(),
            },

            AppError::Database(db_err) => match db_err {
                DbError::ConnectionError(_) => "Database connection error".to_string(),
                DbError::HealthCheckError(_) => "Database health check failed".to_string(),
            },
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("{}", self);
        }

        let mut builder = HttpResponse::build(status);
        if matches!(self, AppError::Auth(AuthError::AccountBanned)) {
            builder.cookie(create_logout_cookie());
        }
        builder.json(ApiError::new(self.user_message()))
    }
}

/// Result type alias for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AUTH_COOKIE_NAME;

    #[test]
    fn test_simple_status_codes() {
        assert_eq!(AppError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::internal("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_errors_unauthorized() {
        for err in [
            AuthError::InvalidCredentials,
            AuthError::TokenExpired,
            AuthError::MissingAuthHeader,
            AuthError::UserNotFound,
        ] {
            assert_eq!(AppError::Auth(err).status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_banned_is_forbidden_and_clears_cookie() {
        let error = AppError::Auth(AuthError::AccountBanned);
        assert_eq!(error.status_code(), StatusCode::FORBIDDEN);

        let response = error.error_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let cookie = response
            .cookies()
            .find(|c| c.name() == AUTH_COOKIE_NAME)
            .expect("logout cookie");
        assert_eq!(cookie.value(), "");
    }

    #[test]
    fn test_policy_error_is_forbidden() {
        let error: AppError = PolicyError::NoDashboardAccess.into();
        assert_eq!(error.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            error.user_message(),
            "Dashboard access requires moderator role or higher"
        );
        assert_eq!(error.error_response().cookies().count(), 0);
    }

    #[test]
    fn test_repository_errors() {
        let error: AppError = RepositoryError::NotFound("Anime".to_string()).into();
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(error.user_message(), "Anime not found");

        let error: AppError = RepositoryError::EmailAlreadyExists.into();
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_scraper_error_hides_details() {
        let error = AppError::Scraping(ScraperError::NetworkError("dns: 10.0.0.1".to_string()));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!error.user_message().contains("10.0.0.1"));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::validation("test error").to_string(),
            "Validation error: test error"
        );
        assert_eq!(AppError::not_found("anime").to_string(), "Not found: anime");
    }
}
