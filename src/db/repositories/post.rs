//! Post repository
//!
//! Each operation borrows one pooled connection, runs a single statement and
//! releases the connection when the guard drops. Writes use `RETURNING` so the
//! existence check and the mutation are one round trip, and run in an explicit
//! transaction that is committed before the result is handed back.

use crate::config::DatabaseDriver;
use crate::db::{DynDatabasePool, StoreError};
use crate::models::{CreatePostInput, Post, UpdatePostInput};
use async_trait::async_trait;
use sqlx::{PgPool, SqlitePool};
use std::future::Future;
use std::sync::Arc;

// SQLite and PostgreSQL both accept `$n` placeholders.
const LIST_SQL: &str = "SELECT id, title, content, published FROM posts ORDER BY id ASC";
const LATEST_SQL: &str =
    "SELECT id, title, content, published FROM posts ORDER BY id DESC LIMIT 1";
const GET_SQL: &str = "SELECT id, title, content, published FROM posts WHERE id = $1";
const INSERT_SQL: &str = "INSERT INTO posts (title, content, published) VALUES ($1, $2, $3) \
     RETURNING id, title, content, published";
const UPDATE_SQL: &str = "UPDATE posts SET title = $1, content = $2, published = $3 \
     WHERE id = $4 RETURNING id, title, content, published";
const DELETE_SQL: &str =
    "DELETE FROM posts WHERE id = $1 RETURNING id, title, content, published";

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// All posts ordered by id ascending
    async fn list(&self) -> Result<Vec<Post>, StoreError>;
    /// The post with the highest id
    async fn latest(&self) -> Result<Post, StoreError>;
    async fn get_by_id(&self, id: i64) -> Result<Post, StoreError>;
    async fn create(&self, input: &CreatePostInput) -> Result<Post, StoreError>;
    /// Replace title, content and published; returns the stored row
    async fn update(&self, id: i64, input: &UpdatePostInput) -> Result<Post, StoreError>;
    /// Remove a post; returns it as it was before deletion
    async fn delete(&self, id: i64) -> Result<Post, StoreError>;
}

pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }

    fn sqlite(&self, operation: &str) -> Result<&SqlitePool, StoreError> {
        self.pool
            .as_sqlite()
            .ok_or_else(|| StoreError::internal(operation, "pool is not a SQLite pool"))
    }

    fn postgres(&self, operation: &str) -> Result<&PgPool, StoreError> {
        self.pool
            .as_postgres()
            .ok_or_else(|| StoreError::internal(operation, "pool is not a PostgreSQL pool"))
    }

    /// Bound a statement by the query timeout and translate its failure.
    ///
    /// Dropping the future on timeout drops the connection guard with it, so
    /// the connection goes back to the pool on this path too.
    async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        let timeout = self.pool.query_timeout();
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result.map_err(|e| StoreError::from_sqlx(e, operation)),
            Err(_) => Err(StoreError::timed_out(operation, timeout)),
        }
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn list(&self) -> Result<Vec<Post>, StoreError> {
        const OP: &str = "list posts";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => self.run(OP, sqlite::list(self.sqlite(OP)?)).await,
            DatabaseDriver::Postgres => self.run(OP, postgres::list(self.postgres(OP)?)).await,
        }
    }

    async fn latest(&self) -> Result<Post, StoreError> {
        const OP: &str = "get latest post";
        let post = match self.pool.driver() {
            DatabaseDriver::Sqlite => self.run(OP, sqlite::latest(self.sqlite(OP)?)).await?,
            DatabaseDriver::Postgres => self.run(OP, postgres::latest(self.postgres(OP)?)).await?,
        };
        post.ok_or_else(|| StoreError::NotFound("No posts found".to_string()))
    }

    async fn get_by_id(&self, id: i64) -> Result<Post, StoreError> {
        const OP: &str = "get post";
        let post = match self.pool.driver() {
            DatabaseDriver::Sqlite => self.run(OP, sqlite::get_by_id(self.sqlite(OP)?, id)).await?,
            DatabaseDriver::Postgres => {
                self.run(OP, postgres::get_by_id(self.postgres(OP)?, id)).await?
            }
        };
        post.ok_or_else(|| StoreError::post_not_found(id))
    }

    async fn create(&self, input: &CreatePostInput) -> Result<Post, StoreError> {
        const OP: &str = "create post";
        input.validate().map_err(StoreError::validation)?;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => self.run(OP, sqlite::create(self.sqlite(OP)?, input)).await,
            DatabaseDriver::Postgres => {
                self.run(OP, postgres::create(self.postgres(OP)?, input)).await
            }
        }
    }

    async fn update(&self, id: i64, input: &UpdatePostInput) -> Result<Post, StoreError> {
        const OP: &str = "update post";
        input.validate().map_err(StoreError::validation)?;
        let post = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                self.run(OP, sqlite::update(self.sqlite(OP)?, id, input)).await?
            }
            DatabaseDriver::Postgres => {
                self.run(OP, postgres::update(self.postgres(OP)?, id, input)).await?
            }
        };
        post.ok_or_else(|| StoreError::post_not_found(id))
    }

    async fn delete(&self, id: i64) -> Result<Post, StoreError> {
        const OP: &str = "delete post";
        let post = match self.pool.driver() {
            DatabaseDriver::Sqlite => self.run(OP, sqlite::delete(self.sqlite(OP)?, id)).await?,
            DatabaseDriver::Postgres => {
                self.run(OP, postgres::delete(self.postgres(OP)?, id)).await?
            }
        };
        post.ok_or_else(|| StoreError::post_not_found(id))
    }
}

/// Generates the statement functions for one driver. The SQL is shared; only
/// the pool and row types differ.
macro_rules! post_statements {
    ($module:ident, $pool:ty, $row:ty) => {
        mod $module {
            use super::*;
            use sqlx::{Connection, Row};

            fn row_to_post(row: &$row) -> Result<Post, sqlx::Error> {
                let post = Post {
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                    content: row.try_get("content")?,
                    published: row.try_get("published")?,
                };
                post.validate().map_err(|e| sqlx::Error::Decode(e.into()))?;
                Ok(post)
            }

            pub(super) async fn list(pool: &$pool) -> Result<Vec<Post>, sqlx::Error> {
                let mut conn = pool.acquire().await?;
                let rows = sqlx::query(LIST_SQL).fetch_all(&mut *conn).await?;
                rows.iter().map(row_to_post).collect()
            }

            pub(super) async fn latest(pool: &$pool) -> Result<Option<Post>, sqlx::Error> {
                let mut conn = pool.acquire().await?;
                let row = sqlx::query(LATEST_SQL).fetch_optional(&mut *conn).await?;
                row.as_ref().map(row_to_post).transpose()
            }

            pub(super) async fn get_by_id(
                pool: &$pool,
                id: i64,
            ) -> Result<Option<Post>, sqlx::Error> {
                let mut conn = pool.acquire().await?;
                let row = sqlx::query(GET_SQL)
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?;
                row.as_ref().map(row_to_post).transpose()
            }

            pub(super) async fn create(
                pool: &$pool,
                input: &CreatePostInput,
            ) -> Result<Post, sqlx::Error> {
                let mut conn = pool.acquire().await?;
                let mut tx = conn.begin().await?;
                let row = sqlx::query(INSERT_SQL)
                    .bind(&input.title)
                    .bind(&input.content)
                    .bind(input.published)
                    .fetch_one(&mut *tx)
                    .await?;
                let post = row_to_post(&row)?;
                tx.commit().await?;
                Ok(post)
            }

            pub(super) async fn update(
                pool: &$pool,
                id: i64,
                input: &UpdatePostInput,
            ) -> Result<Option<Post>, sqlx::Error> {
                let mut conn = pool.acquire().await?;
                let mut tx = conn.begin().await?;
                let row = sqlx::query(UPDATE_SQL)
                    .bind(&input.title)
                    .bind(&input.content)
                    .bind(input.published)
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
                let post = row.as_ref().map(row_to_post).transpose()?;
                tx.commit().await?;
                Ok(post)
            }

            pub(super) async fn delete(
                pool: &$pool,
                id: i64,
            ) -> Result<Option<Post>, sqlx::Error> {
                let mut conn = pool.acquire().await?;
                let mut tx = conn.begin().await?;
                let row = sqlx::query(DELETE_SQL)
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
                let post = row.as_ref().map(row_to_post).transpose()?;
                tx.commit().await?;
                Ok(post)
            }
        }
    };
}

post_statements!(sqlite, SqlitePool, sqlx::sqlite::SqliteRow);
post_statements!(postgres, PgPool, sqlx::postgres::PgRow);
