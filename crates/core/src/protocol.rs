//! Wire types exchanged between the dispatcher and its workers.
//!
//! The dispatcher serializes these from database rows; the worker
//! deserializes them from HTTP responses. Keeping them here means the two
//! sides can never drift apart.

use serde::{Deserialize, Serialize};

use crate::lifecycle::JobStatus;
use crate::types::{DbId, Payload, Timestamp};

/// A stored inbound request, with its payload parsed back into JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub id: DbId,
    pub received_at: Timestamp,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub method: String,
    pub request_url: String,
    pub payload: Payload,
    pub tag: Option<String>,
    pub is_handled: bool,
    pub is_being_processed: bool,
}

/// A job as seen by workers and operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: DbId,
    /// `None` once the owning request has been deleted.
    pub request_id: Option<DbId>,
    pub status: JobStatus,
    pub claimed_by: Option<String>,
    pub created_at: Timestamp,
    pub modified_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

/// One entry in a job's append-only audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub id: DbId,
    pub job_id: DbId,
    pub created_at: Timestamp,
    pub message: String,
}

/// Response body of a successful claim: the job and the request it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimedJob {
    pub job: JobSnapshot,
    pub request: RequestSnapshot,
}

/// A job with its ordered event trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetail {
    pub job: JobSnapshot,
    pub events: Vec<EventSnapshot>,
}

/// Ids assigned by an ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingested {
    /// The new request id.
    pub id: DbId,
    pub job_id: DbId,
}

/// `?tag=` query string accepted by ingest and claim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Body of `PUT /jobs/{id}/update-status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateJobStatus {
    pub status: JobStatus,
    /// Event message recorded with the transition. A default is used when absent.
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `POST /jobs/{id}/insert-event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertEvent {
    pub message: String,
}

/// Body of `PUT /request/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub is_handled: Option<bool>,
}

/// Plain `{ "message": ... }` body used for acknowledgements and the
/// empty-queue answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
