//! Handlers for the `/request` resource: ingest and administration.
//!
//! All endpoints require [`BearerAuth`].

use axum::body::Bytes;
use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::header::USER_AGENT;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use hopper_core::error::CoreError;
use hopper_core::job_queue::validate_tag;
use hopper_core::protocol::{RequestSnapshot, TagFilter, UpdateRequest};
use hopper_core::types::DbId;
use hopper_db::models::request::NewRequest;
use hopper_db::repositories::RequestRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::BearerAuth;
use crate::middleware::request_meta::ClientAddr;
use crate::response::DataResponse;
use crate::state::AppState;

/// Parse the raw ingest body. An empty body stands for `{}`.
fn parse_payload(body: &[u8]) -> AppResult<serde_json::Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Request body must be valid JSON: {e}")))
}

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Request",
        id,
    })
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

/// POST /api/v1/request?tag=
///
/// Persist an arbitrary JSON body with its origin metadata and create the
/// Pending job for it. Returns 201 with `{id, job_id}`.
#[allow(clippy::too_many_arguments)]
pub async fn ingest(
    _auth: BearerAuth,
    State(state): State<AppState>,
    ClientAddr(source_ip): ClientAddr,
    Query(filter): Query<TagFilter>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    if let Some(tag) = filter.tag.as_deref() {
        validate_tag(tag)?;
    }
    let payload = parse_payload(&body)?;

    let input = NewRequest {
        source_ip,
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        method: method.to_string(),
        request_url: uri.to_string(),
        payload,
        tag: filter.tag,
    };

    let ingested = RequestRepo::ingest(&state.pool, &input).await?;

    tracing::info!(
        request_id = ingested.id,
        job_id = ingested.job_id,
        tag = input.tag.as_deref().unwrap_or("-"),
        "Request ingested",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: ingested })))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/request/{id}
pub async fn get_request(
    _auth: BearerAuth,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let request = RequestRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    Ok(Json(DataResponse {
        data: RequestSnapshot::from(request),
    }))
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// PUT /api/v1/request/{id}
///
/// Administrative edit of the handled flag. Marking a request handled makes
/// its pending job unclaimable.
pub async fn update_request(
    _auth: BearerAuth,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateRequest>,
) -> AppResult<impl IntoResponse> {
    let request = RequestRepo::update(&state.pool, id, &input)
        .await?
        .ok_or_else(|| not_found(id))?;

    tracing::info!(request_id = id, is_handled = request.is_handled, "Request updated");

    Ok(Json(DataResponse {
        data: RequestSnapshot::from(request),
    }))
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// DELETE /api/v1/request/{id}
///
/// Returns 204. The request's job and its events are kept.
pub async fn delete_request(
    _auth: BearerAuth,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if !RequestRepo::delete(&state.pool, id).await? {
        return Err(not_found(id));
    }

    tracing::info!(request_id = id, "Request deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn empty_body_is_empty_object() {
        assert_eq!(parse_payload(b"").unwrap(), serde_json::json!({}));
        assert_eq!(parse_payload(b" \n").unwrap(), serde_json::json!({}));
    }

    #[test]
    fn any_json_value_is_accepted() {
        assert_eq!(parse_payload(b"[1,2]").unwrap(), serde_json::json!([1, 2]));
        assert_eq!(parse_payload(b"\"x\"").unwrap(), serde_json::json!("x"));
    }

    #[test]
    fn non_json_body_is_rejected() {
        assert_matches!(parse_payload(b"name=value"), Err(AppError::BadRequest(_)));
    }
}
