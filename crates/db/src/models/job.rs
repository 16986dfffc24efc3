//! Job entity and its wire conversion.

use hopper_core::error::CoreError;
use hopper_core::protocol::JobSnapshot;
use hopper_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{JobStatus, StatusId};

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub request_id: Option<DbId>,
    pub status_id: StatusId,
    pub claimed_by: Option<String>,
    pub created_at: Timestamp,
    pub modified_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl Job {
    /// Decode `status_id`. Only fails if the lookup table holds a row the
    /// code does not know about.
    pub fn status(&self) -> Result<JobStatus, CoreError> {
        JobStatus::from_id(self.status_id).ok_or_else(|| {
            CoreError::Internal(format!(
                "Job {} has unknown status id {}",
                self.id, self.status_id
            ))
        })
    }
}

impl TryFrom<Job> for JobSnapshot {
    type Error = CoreError;

    fn try_from(row: Job) -> Result<Self, Self::Error> {
        let status = row.status()?;
        Ok(JobSnapshot {
            id: row.id,
            request_id: row.request_id,
            status,
            claimed_by: row.claimed_by,
            created_at: row.created_at,
            modified_at: row.modified_at,
            finished_at: row.finished_at,
        })
    }
}
