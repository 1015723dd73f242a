//! Storage error translation
//!
//! Every failure coming out of sqlx is translated here, once, into one of the
//! categories the rest of the service understands. Raw driver errors do not
//! leave the `db` module.

use sqlx::error::{DatabaseError, ErrorKind};
use sqlx::sqlite::SqliteError;
use std::time::Duration;

/// PostgreSQL SQLSTATEs that mean the backend cannot serve the request:
/// class `08` (connection exception), `57P01`..`57P03` (shutdown or not
/// yet accepting connections) and `53300` (too many connections).
const PG_UNAVAILABLE_PREFIXES: &[&str] = &["08", "57P01", "57P02", "57P03", "53300"];

/// SQLite primary result codes for lock contention that outlasted
/// `busy_timeout`: `SQLITE_BUSY` and `SQLITE_LOCKED`.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Errors surfaced by repository operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The targeted post does not exist
    #[error("{0}")]
    NotFound(String),

    /// Input rejected, either before reaching storage or by a constraint
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        /// A unique constraint was hit, as opposed to a malformed value
        conflict: bool,
    },

    /// Backend unreachable, pool exhausted or closed, or statement timed out
    #[error("Database temporarily unavailable: {0}")]
    Unavailable(String),

    /// Anything else. Details are logged when the error is created.
    #[error("Internal error")]
    Internal,
}

impl StoreError {
    pub fn post_not_found(id: i64) -> Self {
        Self::NotFound(format!("Post with ID {} not found", id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            conflict: false,
        }
    }

    /// Record the detail in the operational log and return an opaque error.
    pub fn internal(operation: &str, detail: impl std::fmt::Display) -> Self {
        tracing::error!(operation, error = %detail, "Post storage operation failed");
        Self::Internal
    }

    /// Translate a driver error raised while running `operation`.
    pub fn from_sqlx(err: sqlx::Error, operation: &str) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("Post not found".to_string()),
            sqlx::Error::PoolTimedOut => {
                tracing::warn!(operation, "Timed out waiting for a database connection");
                Self::Unavailable("no database connection available".to_string())
            }
            sqlx::Error::PoolClosed => {
                tracing::warn!(operation, "Database pool is closed");
                Self::Unavailable("database pool is closed".to_string())
            }
            sqlx::Error::Io(ref e) => {
                tracing::error!(operation, error = %e, "Database I/O failure");
                Self::Unavailable("database connection failed".to_string())
            }
            sqlx::Error::Tls(ref e) => {
                tracing::error!(operation, error = %e, "Database TLS failure");
                Self::Unavailable("database connection failed".to_string())
            }
            sqlx::Error::WorkerCrashed => {
                tracing::error!(operation, "Database connection worker crashed");
                Self::Unavailable("database connection failed".to_string())
            }
            sqlx::Error::Database(ref db_err) => {
                let constraint = db_err.constraint().map(str::to_string);
                match db_err.kind() {
                    ErrorKind::UniqueViolation => {
                        tracing::warn!(operation, ?constraint, "Unique constraint violated");
                        Self::Validation {
                            message: "A post with this title already exists".to_string(),
                            conflict: true,
                        }
                    }
                    ErrorKind::CheckViolation => {
                        tracing::warn!(operation, ?constraint, "Check constraint violated");
                        Self::validation(format!(
                            "Content must be longer than {} characters",
                            crate::models::MIN_CONTENT_LENGTH
                        ))
                    }
                    ErrorKind::NotNullViolation => {
                        tracing::warn!(operation, ?constraint, "Not-null constraint violated");
                        Self::validation("Title and content are required")
                    }
                    _ if is_sqlite_busy(&**db_err) => {
                        tracing::warn!(operation, error = %db_err, "SQLite database is locked");
                        Self::Unavailable("database is busy".to_string())
                    }
                    _ if is_unavailable_code(db_err.code().as_deref()) => {
                        tracing::error!(operation, error = %db_err, "Database refused the operation");
                        Self::Unavailable("database is not accepting requests".to_string())
                    }
                    _ => Self::internal(operation, &err),
                }
            }
            other => Self::internal(operation, &other),
        }
    }

    /// The statement did not complete within the configured query timeout.
    pub fn timed_out(operation: &str, timeout: Duration) -> Self {
        tracing::warn!(operation, timeout_secs = timeout.as_secs(), "Database statement timed out");
        Self::Unavailable(format!("operation timed out after {}s", timeout.as_secs()))
    }

    /// Whether the caller may reasonably retry later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation { conflict: true, .. } => "CONFLICT",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Unavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

fn is_unavailable_code(code: Option<&str>) -> bool {
    code.map_or(false, |code| {
        PG_UNAVAILABLE_PREFIXES
            .iter()
            .any(|prefix| code.starts_with(prefix))
    })
}

/// Extended SQLite codes keep the primary code in the low byte.
fn is_sqlite_busy(db_err: &dyn DatabaseError) -> bool {
    if db_err.try_downcast_ref::<SqliteError>().is_none() {
        return false;
    }
    db_err
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .map_or(false, is_busy_result_code)
}

fn is_busy_result_code(code: i32) -> bool {
    matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)
}
