pub mod health;
pub mod jobs;
pub mod requests;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /request                          ingest (POST)
/// /request/{id}                     get, update, delete
///
/// /jobs/next-pending                claim (GET)
/// /jobs/{id}                        job with event trail
/// /jobs/{id}/update-status          report outcome (PUT)
/// /jobs/{id}/insert-event           append event (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/request", requests::router())
        .nest("/jobs", jobs::router())
}
