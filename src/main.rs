//! AnimeFlow API Server
//!
//! Main entry point for the catalog REST API.

use std::io;

use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use animeflow::auth::AuthConfig;
use animeflow::config::Config;
use animeflow::db::Database;
use animeflow::routes::{configure_routes, ApiDoc, AppState};

/// Health check endpoint
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Database health check endpoint
async fn db_health_check(data: web::Data<AppState>) -> impl Responder {
    match data.db.health_check().await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "healthy",
            "database": "connected",
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
        Err(e) => {
            error!("Database health check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "unhealthy",
                "database": "disconnected",
                "error": e.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }))
        }
    }
}

fn startup_error(context: &str, e: impl std::fmt::Display) -> io::Error {
    error!("{}: {}", context, e);
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| startup_error("Invalid configuration", e))?;
    let bind_address = format!("{}:{}", config.host, config.port);

    info!("Connecting to database...");
    let db = Database::new(&config.database_url)
        .await
        .map_err(|e| startup_error("Failed to connect to database", e))?;

    info!("Running database migrations...");
    db.run_migrations()
        .await
        .map_err(|e| startup_error("Failed to run database migrations", e))?;

    if config.owner_email.is_none() {
        info!("OWNER_EMAIL not set, no account is bootstrapped as owner");
    }

    let auth_config = web::Data::new(AuthConfig {
        jwt_secret: config.jwt_secret.clone(),
    });
    let app_state = web::Data::new(AppState { db, config });

    info!("Starting AnimeFlow API server on {}", bind_address);

    let openapi = ApiDoc::openapi();

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(auth_config.clone())
            .route("/health", web::get().to(health_check))
            .route("/health/db", web::get().to(db_health_check))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
