//! Health endpoint
//!
//! GET /api/v1/health - database reachability and pool accounting

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::AppState;
use crate::db::PoolStatus;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: String,
    pub pool: PoolStatus,
    pub in_use: usize,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// GET /api/v1/health
///
/// 503 when the database does not answer a ping within the query timeout.
/// Pool accounting is read before the ping so the check's own connection
/// is not counted as in use.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let pool = state.pool.status();
    let reachable = match tokio::time::timeout(state.pool.query_timeout(), state.pool.ping()).await
    {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Health check ping failed");
            false
        }
        Err(_) => {
            tracing::warn!("Health check ping timed out");
            false
        }
    };

    let (status, label) = if reachable {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    (
        status,
        Json(HealthResponse {
            status: label,
            database: state.pool.driver().to_string(),
            pool,
            in_use: pool.in_use(),
        }),
    )
}
