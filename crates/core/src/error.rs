use crate::lifecycle::JobStatus;
use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Conflict raised when a job is asked to move from `from` to `to`
    /// and the lifecycle does not allow it.
    pub fn invalid_transition(job_id: DbId, from: JobStatus, to: JobStatus) -> Self {
        CoreError::Conflict(format!(
            "Job {job_id} cannot move from {from} to {to}"
        ))
    }
}
