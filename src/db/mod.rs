//! Database module for the AnimeFlow API
//!
//! Provides connection pool management, migrations, health checks and the
//! repository functions for accounts, catalog, favorites and settings.

pub mod repository;

pub use repository::*;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Error as SqlxError;
use std::time::Duration;
use thiserror::Error;

use crate::crawler::CatalogSink;
use crate::parser::ScrapedAnime;

/// Database-related errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(#[from] SqlxError),

    #[error("Database health check failed: {0}")]
    HealthCheckError(String),
}

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    ///
    /// # Returns
    /// A Database wrapping a pool of up to ten connections
    pub async fn new(database_url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool, e.g. a lazy one in route tests
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded migrations from `./migrations`
    ///
    /// # Returns
    /// Ok(()) once every pending migration has run, error otherwise
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DbError::ConnectionError(SqlxError::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Check database health by executing a trivial query
    ///
    /// # Returns
    /// Ok(()) if the database answers, `DbError::HealthCheckError` otherwise
    pub async fn health_check(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::HealthCheckError(e.to_string()))?;
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to return
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CatalogSink for Database {
    async fn insert_scraped(&self, anime: &ScrapedAnime) -> Result<(), RepositoryError> {
        insert_scraped_anime(&self.pool, anime).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires a running database
    async fn test_database_connection() {
        dotenvy::dotenv().ok();
        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

        let db = Database::new(&database_url).await.expect("connect");
        assert!(db.health_check().await.is_ok(), "Health check should pass");
        db.close().await;
    }
}
