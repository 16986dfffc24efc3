//! Unauthenticated liveness probe, mounted at the root.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use hopper_db::repositories::{JobRepo, QueueDepth};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` when the store answered, `degraded` otherwise.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    /// Pending and Processing job counts; absent when the store is down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<QueueDepth>,
}

/// GET /health
///
/// Counting the queue doubles as the store round trip.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let queue = match JobRepo::queue_depth(&state.pool).await {
        Ok(depth) => Some(depth),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the store");
            None
        }
    };
    let db_healthy = queue.is_some();

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        queue,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
