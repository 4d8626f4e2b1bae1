use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use std::time::Duration;
use tracing::{error, info};

use crate::error::{AppError, Result};

/// The narrow surface the database health check needs from a connection.
///
/// Any concrete client is adapted to this at the boundary; the check itself
/// never sees pool or driver types.
#[async_trait::async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// Identifier used in report details.
    fn alias(&self) -> &str;

    /// Establishes or re-verifies the underlying connection.
    async fn ensure_connection(&self) -> Result<()>;

    /// Cheap usability probe on an established connection.
    async fn is_usable(&self) -> bool;
}

/// SQLite-backed implementation of [`DatabaseConnection`].
#[derive(Clone)]
pub struct SqliteDatabase {
    alias: String,
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub fn new(alias: impl Into<String>, pool: SqlitePool) -> Self {
        Self {
            alias: alias.into(),
            pool,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl DatabaseConnection for SqliteDatabase {
    fn alias(&self) -> &str {
        &self.alias
    }

    async fn ensure_connection(&self) -> Result<()> {
        let row = sqlx::query("SELECT 1 as test")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database '{}' connection check failed: {}", self.alias, e);
                AppError::from(e)
            })?;

        let test_value: i32 = row.try_get("test").map_err(AppError::from)?;
        if test_value == 1 {
            Ok(())
        } else {
            Err(AppError::Database(format!(
                "unexpected probe result from '{}'",
                self.alias
            )))
        }
    }

    async fn is_usable(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}

pub async fn get_database_pool(database_url: &str) -> Result<SqlitePool> {
    info!("Connecting to database: {}", database_url);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .test_before_acquire(true)
        .connect(database_url)
        .await
        .map_err(|e| {
            error!("Failed to create database pool: {}", e);
            AppError::from(e)
        })?;

    sqlx::query("PRAGMA busy_timeout = 30000")
        .execute(&pool)
        .await
        .map_err(AppError::from)?;

    info!("Database connection pool created successfully");
    Ok(pool)
}
