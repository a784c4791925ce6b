use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from DatabaseManager and the Postgres store
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Schema shipped with the binary, applied by `sphere migrate`
pub const INIT_SQL: &str = include_str!("../../migrations/0001_init.sql");

/// Connection pool construction and maintenance for the Postgres store
pub struct DatabaseManager;

impl DatabaseManager {
    /// Open a pool from config; fails when no URL is configured
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        let parsed = Self::validate_url(url)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        info!(
            "Created database pool for {}{}",
            parsed.host_str().unwrap_or("localhost"),
            parsed.path()
        );
        Ok(pool)
    }

    fn validate_url(url: &str) -> Result<url::Url, DatabaseError> {
        let parsed = url::Url::parse(url).map_err(|e| DatabaseError::InvalidDatabaseUrl(e.to_string()))?;
        match parsed.scheme() {
            "postgres" | "postgresql" => Ok(parsed),
            other => Err(DatabaseError::InvalidDatabaseUrl(format!("unsupported scheme '{}'", other))),
        }
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    /// Apply the bundled schema. Statements are idempotent (`IF NOT EXISTS`).
    pub async fn migrate(pool: &PgPool) -> Result<usize, DatabaseError> {
        let statements = Self::split_statements(INIT_SQL);
        for statement in &statements {
            sqlx::query(statement).execute(pool).await?;
        }
        info!("Applied {} schema statements", statements.len());
        Ok(statements.len())
    }

    fn split_statements(sql: &str) -> Vec<String> {
        sql.split(';')
            .map(|chunk| {
                chunk
                    .lines()
                    .filter(|line| !line.trim_start().starts_with("--"))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
