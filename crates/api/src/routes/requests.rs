//! Route definitions for the `/request` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::requests;
use crate::state::AppState;

/// Routes mounted at `/request`.
///
/// ```text
/// POST   /                -> ingest
/// GET    /{id}            -> get_request
/// PUT    /{id}            -> update_request
/// DELETE /{id}            -> delete_request
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(requests::ingest)).route(
        "/{id}",
        get(requests::get_request)
            .put(requests::update_request)
            .delete(requests::delete_request),
    )
}
