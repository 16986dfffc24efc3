//! Route definitions for the `/jobs` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /next-pending        -> claim_next
/// GET    /{id}                -> get_job
/// PUT    /{id}/update-status  -> update_status
/// POST   /{id}/insert-event   -> insert_event
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/next-pending", get(jobs::claim_next))
        .route("/{id}", get(jobs::get_job))
        .route("/{id}/update-status", put(jobs::update_status))
        .route("/{id}/insert-event", post(jobs::insert_event))
}
