//! Handlers for the `/jobs` resource: the worker-facing claim protocol.
//!
//! All endpoints require [`BearerAuth`].

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hopper_core::error::CoreError;
use hopper_core::job_queue::{
    completed_message, failed_message, validate_event_message, validate_tag,
};
use hopper_core::lifecycle::JobOutcome;
use hopper_core::protocol::{
    ClaimedJob, EventSnapshot, InsertEvent, JobDetail, JobSnapshot, MessageResponse,
    RequestSnapshot, TagFilter, UpdateJobStatus,
};
use hopper_core::types::DbId;
use hopper_db::repositories::{JobEventRepo, JobRepo, TransitionResult};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::BearerAuth;
use crate::middleware::request_meta::WorkerId;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of the 404 returned when nothing is claimable.
pub const NO_PENDING_JOBS: &str = "No pending jobs";

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound { entity: "Job", id })
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/next-pending?tag=
///
/// Atomically claim the oldest eligible pending job. Returns the job and
/// its request, or 404 `{"message": "No pending jobs"}` when the queue has
/// nothing for this caller. The optional `X-Worker-Id` header is recorded
/// as the claimant.
pub async fn claim_next(
    _auth: BearerAuth,
    State(state): State<AppState>,
    WorkerId(worker): WorkerId,
    Query(filter): Query<TagFilter>,
) -> AppResult<Response> {
    if let Some(tag) = filter.tag.as_deref() {
        validate_tag(tag)?;
    }

    let claimed =
        JobRepo::claim_next(&state.pool, filter.tag.as_deref(), worker.as_deref()).await?;

    let Some((job, request)) = claimed else {
        tracing::debug!(tag = filter.tag.as_deref().unwrap_or("-"), "No pending jobs");
        let body = MessageResponse {
            message: NO_PENDING_JOBS.to_string(),
        };
        return Ok((StatusCode::NOT_FOUND, Json(body)).into_response());
    };

    tracing::info!(
        job_id = job.id,
        request_id = request.id,
        worker = worker.as_deref().unwrap_or("-"),
        "Job claimed",
    );

    let data = ClaimedJob {
        job: JobSnapshot::try_from(job)?,
        request: RequestSnapshot::from(request),
    };
    Ok(Json(DataResponse { data }).into_response())
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
///
/// The job and its event trail, oldest event first.
pub async fn get_job(
    _auth: BearerAuth,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = JobRepo::find_by_id(&state.pool, job_id)
        .await?
        .ok_or_else(|| not_found(job_id))?;
    let events = JobEventRepo::list_for_job(&state.pool, job_id).await?;

    let data = JobDetail {
        job: JobSnapshot::try_from(job)?,
        events: events.into_iter().map(EventSnapshot::from).collect(),
    };
    Ok(Json(DataResponse { data }))
}

// ---------------------------------------------------------------------------
// Report outcome
// ---------------------------------------------------------------------------

/// PUT /api/v1/jobs/{id}/update-status
///
/// Report a terminal outcome for a Processing job. 400 for a non-terminal
/// target status, 404 for an unknown job, 409 if the job is not Processing.
pub async fn update_status(
    _auth: BearerAuth,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<UpdateJobStatus>,
) -> AppResult<impl IntoResponse> {
    let outcome = JobOutcome::try_from(input.status)?;

    let message = match input.message {
        Some(message) => {
            validate_event_message(&message)?;
            message
        }
        None => match outcome {
            JobOutcome::Completed => completed_message(job_id),
            JobOutcome::Failed => failed_message(job_id),
        },
    };

    match JobRepo::report_outcome(&state.pool, job_id, outcome, &message).await? {
        TransitionResult::Applied(job) => {
            tracing::info!(job_id, %outcome, "Job outcome reported");
            Ok(Json(DataResponse {
                data: JobSnapshot::try_from(job)?,
            }))
        }
        TransitionResult::NotFound => Err(not_found(job_id)),
        TransitionResult::Conflict { current } => {
            tracing::warn!(job_id, %current, %outcome, "Rejected outcome report");
            Err(CoreError::invalid_transition(job_id, current, outcome.status()).into())
        }
    }
}

// ---------------------------------------------------------------------------
// Append event
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/insert-event
///
/// Append a free-form event. Legal in every job state. Returns 201.
pub async fn insert_event(
    _auth: BearerAuth,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<InsertEvent>,
) -> AppResult<impl IntoResponse> {
    validate_event_message(&input.message)?;

    let event = JobEventRepo::append(&state.pool, job_id, &input.message)
        .await?
        .ok_or_else(|| not_found(job_id))?;

    tracing::debug!(job_id, event_id = event.id, "Job event appended");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: EventSnapshot::from(event),
        }),
    ))
}
