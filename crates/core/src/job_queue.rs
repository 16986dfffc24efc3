//! Job queue constants, event messages, and validation.
//!
//! Pure functions and constants used by both the dispatcher and the worker.
//! Lives in `core` to maintain zero internal dependency constraint.

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Header a poller uses to identify itself when claiming a job.
pub const WORKER_ID_HEADER: &str = "x-worker-id";

/// A Processing job with no status change and no event for this many
/// seconds is failed by the lease sweeper.
pub const DEFAULT_JOB_LEASE_SECS: u64 = 3600;

/// How often the lease sweeper looks for expired claims.
pub const DEFAULT_LEASE_SWEEP_INTERVAL_SECS: u64 = 60;

/// How long a poller sleeps after the queue reports no pending jobs.
pub const DEFAULT_POLL_IDLE_MS: u64 = 5000;

/// How long a poller sleeps after a transport or dispatcher error.
pub const DEFAULT_POLL_ERROR_MS: u64 = 5000;

/// Maximum length of a request tag.
pub const MAX_TAG_LEN: usize = 256;

/// Maximum length of a single event message.
pub const MAX_EVENT_MESSAGE_LEN: usize = 8192;

/// Maximum length of a worker identity.
pub const MAX_WORKER_ID_LEN: usize = 128;

// ---------------------------------------------------------------------------
// Event messages
// ---------------------------------------------------------------------------

/// Event appended when a job is claimed.
pub fn claimed_message(job_id: DbId, request_id: DbId, worker: Option<&str>) -> String {
    match worker {
        Some(worker) => {
            format!("Job {job_id} (request {request_id}) claimed by {worker}")
        }
        None => format!("Job {job_id} (request {request_id}) claimed"),
    }
}

/// Event appended by a worker right before the callback runs.
pub fn started_message(job_id: DbId, request_id: DbId) -> String {
    format!("Started processing job {job_id}, originated from request {request_id}")
}

/// Default event for a Completed report without a message.
pub fn completed_message(job_id: DbId) -> String {
    format!("Completed processing job {job_id}")
}

/// Default event for a Failed report without a message.
pub fn failed_message(job_id: DbId) -> String {
    format!("Failed processing job {job_id}")
}

/// Event appended when the lease sweeper fails an abandoned job.
pub fn lease_expired_message(lease_secs: u64) -> String {
    format!("Lease expired after {lease_secs}s without progress; job failed")
}

/// Truncate a message to [`MAX_EVENT_MESSAGE_LEN`] bytes on a char boundary.
///
/// Used for machine-generated messages (error text, panic payloads) that
/// must never be rejected by validation.
pub fn truncate_message(message: &str) -> String {
    if message.len() <= MAX_EVENT_MESSAGE_LEN {
        return message.to_string();
    }
    let mut end = MAX_EVENT_MESSAGE_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a request tag.
///
/// Rules:
/// - Must not be empty or whitespace only.
/// - Must not exceed `MAX_TAG_LEN` characters.
pub fn validate_tag(tag: &str) -> Result<(), CoreError> {
    if tag.trim().is_empty() {
        return Err(CoreError::Validation("Tag must not be empty".to_string()));
    }
    if tag.chars().count() > MAX_TAG_LEN {
        return Err(CoreError::Validation(format!(
            "Tag must not exceed {MAX_TAG_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate an event message.
pub fn validate_event_message(message: &str) -> Result<(), CoreError> {
    if message.trim().is_empty() {
        return Err(CoreError::Validation(
            "Event message must not be empty".to_string(),
        ));
    }
    if message.len() > MAX_EVENT_MESSAGE_LEN {
        return Err(CoreError::Validation(format!(
            "Event message must not exceed {MAX_EVENT_MESSAGE_LEN} bytes"
        )));
    }
    Ok(())
}

/// Validate a worker identity sent in [`WORKER_ID_HEADER`].
///
/// Rules:
/// - Must not be empty.
/// - Must not exceed `MAX_WORKER_ID_LEN` characters.
/// - Must contain only alphanumeric, hyphen, underscore, dot, or slash characters.
pub fn validate_worker_id(worker: &str) -> Result<(), CoreError> {
    if worker.is_empty() {
        return Err(CoreError::Validation(
            "Worker id must not be empty".to_string(),
        ));
    }
    if worker.chars().count() > MAX_WORKER_ID_LEN {
        return Err(CoreError::Validation(format!(
            "Worker id must not exceed {MAX_WORKER_ID_LEN} characters"
        )));
    }
    if !worker
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
    {
        return Err(CoreError::Validation(
            "Worker id may only contain alphanumeric, hyphen, underscore, dot, or slash characters"
                .to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
