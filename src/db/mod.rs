//! Database layer
//!
//! This module provides database access for the posts service.
//! It supports:
//! - SQLite (default, for single-binary deployment and tests)
//! - PostgreSQL
//!
//! The database driver is selected based on configuration.
//!
//! # Architecture
//!
//! `DatabasePool` hides the concrete backend behind a trait object. Repository
//! operations borrow one connection per call and translate every driver
//! failure into a `StoreError` before returning.
//!
//! # Usage
//!
//! ```ignore
//! use postboard::config::DatabaseConfig;
//! use postboard::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repositories;

pub use error::StoreError;
pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, PoolStatus, PostgresDatabase,
    SqliteDatabase,
};
