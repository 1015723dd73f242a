//! Database connection pool abstraction
//!
//! This module provides a unified interface over the SQLite and PostgreSQL
//! pools. The pool is created once at startup, verified with a health check,
//! and closed once at shutdown. Connections are borrowed per operation as
//! `PoolConnection` guards, which go back to the pool when dropped.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{DatabaseConfig, DatabaseDriver};

/// Snapshot of the pool's accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Open connections, idle or in use
    pub size: u32,
    /// Open connections not currently borrowed
    pub idle: usize,
    pub max_connections: u32,
}

impl PoolStatus {
    pub fn in_use(&self) -> usize {
        (self.size as usize).saturating_sub(self.idle)
    }
}

/// Database pool trait that abstracts over the supported backends.
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Execute a raw SQL statement that doesn't return rows
    async fn execute(&self, query: &str) -> Result<u64>;

    /// Check if the database connection is healthy
    async fn ping(&self) -> Result<()>;

    /// Close every pooled connection. Later acquires fail.
    async fn close(&self);

    fn is_closed(&self) -> bool;

    fn status(&self) -> PoolStatus;

    /// Upper bound on a single repository statement
    fn query_timeout(&self) -> Duration;

    /// Get the database driver type
    fn driver(&self) -> DatabaseDriver;

    /// Get the underlying SQLite pool if this is a SQLite connection
    fn as_sqlite(&self) -> Option<&SqlitePool>;

    /// Get the underlying PostgreSQL pool if this is a PostgreSQL connection
    fn as_postgres(&self) -> Option<&PgPool>;
}

fn is_memory_url(url: &str) -> bool {
    url == ":memory:" || url.starts_with("sqlite::memory:") || url.contains("mode=memory")
}

/// SQLite connection pool implementation
pub struct SqliteDatabase {
    pool: SqlitePool,
    max_connections: u32,
    query_timeout: Duration,
}

impl SqliteDatabase {
    /// Create a new SQLite connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let url = config.connection_url();
        let memory = is_memory_url(&url);

        // Ensure the database directory exists for file-based SQLite
        if !memory {
            let path = url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
            let path = path.split('?').next().unwrap_or(path);
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create database directory: {:?}", parent)
                    })?;
                }
            }
        }

        let connection_url = if url == ":memory:" {
            "sqlite::memory:".to_string()
        } else if url.starts_with("sqlite:") {
            url.clone()
        } else {
            format!("sqlite:{}", url)
        };

        let options = SqliteConnectOptions::from_str(&connection_url)
            .with_context(|| format!("Invalid SQLite URL: {}", url))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every in-memory connection is its own database, so the pool is
        // pinned to one connection that is never recycled.
        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(config.acquire_timeout())
            .test_before_acquire(true);
        let max_connections = if memory {
            pool_options = pool_options
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
            1
        } else {
            pool_options = pool_options
                .min_connections(config.min_connections)
                .max_connections(config.max_connections)
                .idle_timeout(config.idle_timeout())
                .max_lifetime(config.max_lifetime());
            config.max_connections
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to SQLite database: {}", url))?;

        Ok(Self {
            pool,
            max_connections,
            query_timeout: config.query_timeout(),
        })
    }
}

#[async_trait]
impl DatabasePool for SqliteDatabase {
    async fn execute(&self, query: &str) -> Result<u64> {
        let result = sqlx::query(query)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to execute query: {}", query))?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    fn status(&self) -> PoolStatus {
        PoolStatus {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max_connections: self.max_connections,
        }
    }

    fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Sqlite
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        Some(&self.pool)
    }

    fn as_postgres(&self) -> Option<&PgPool> {
        None
    }
}

/// PostgreSQL connection pool implementation
pub struct PostgresDatabase {
    pool: PgPool,
    max_connections: u32,
    query_timeout: Duration,
}

impl PostgresDatabase {
    /// Create a new PostgreSQL connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let url = config.connection_url();
        let connection_url = if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            url
        } else {
            format!("postgres://{}", url)
        };

        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(config.idle_timeout())
            .max_lifetime(config.max_lifetime())
            .test_before_acquire(true)
            .connect(&connection_url)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to PostgreSQL database at {}:{}/{}",
                    config.host, config.port, config.name
                )
            })?;

        Ok(Self {
            pool,
            max_connections: config.max_connections,
            query_timeout: config.query_timeout(),
        })
    }
}

#[async_trait]
impl DatabasePool for PostgresDatabase {
    async fn execute(&self, query: &str) -> Result<u64> {
        let result = sqlx::query(query)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to execute query: {}", query))?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    fn status(&self) -> PoolStatus {
        PoolStatus {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max_connections: self.max_connections,
        }
    }

    fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Postgres
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        None
    }

    fn as_postgres(&self) -> Option<&PgPool> {
        Some(&self.pool)
    }
}

/// Type alias for a shared database pool
pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// Create and verify a database connection pool.
///
/// Connects with the configured bounds, then runs `SELECT 1` within the
/// connect timeout. Any failure is returned to the caller, which is expected
/// to abort startup rather than serve traffic against a dead backend.
///
/// # Example
///
/// ```ignore
/// use postboard::config::DatabaseConfig;
/// use postboard::db::create_pool;
///
/// let pool = create_pool(&DatabaseConfig::default()).await?;
/// pool.ping().await?;
/// ```
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    tracing::debug!(
        driver = %config.driver,
        min_connections = config.min_connections,
        max_connections = config.max_connections,
        acquire_timeout_secs = config.acquire_timeout_secs,
        connect_timeout_secs = config.connect_timeout_secs,
        "Creating database pool"
    );

    let pool: DynDatabasePool = match config.driver {
        DatabaseDriver::Sqlite => Arc::new(SqliteDatabase::new(config).await?),
        DatabaseDriver::Postgres => Arc::new(PostgresDatabase::new(config).await?),
    };

    match tokio::time::timeout(config.connect_timeout(), pool.ping()).await {
        Ok(Ok(())) => {
            let status = pool.status();
            tracing::info!(
                driver = %config.driver,
                size = status.size,
                max_connections = status.max_connections,
                "Database pool created and verified"
            );
            Ok(pool)
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Database connection verification failed");
            pool.close().await;
            Err(e.context("Database health check failed"))
        }
        Err(_) => {
            tracing::error!(
                timeout_secs = config.connect_timeout_secs,
                "Database connection verification timed out"
            );
            pool.close().await;
            anyhow::bail!(
                "Database health check timed out after {}s",
                config.connect_timeout_secs
            )
        }
    }
}

/// Create a SQLite in-memory database pool for testing
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    create_pool(&DatabaseConfig::sqlite_memory()).await
}
