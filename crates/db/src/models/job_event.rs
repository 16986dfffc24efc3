//! Job audit-trail entries.

use hopper_core::protocol::EventSnapshot;
use hopper_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `job_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobEvent {
    pub id: DbId,
    pub job_id: DbId,
    pub created_at: Timestamp,
    pub message: String,
}

impl From<JobEvent> for EventSnapshot {
    fn from(row: JobEvent) -> Self {
        EventSnapshot {
            id: row.id,
            job_id: row.job_id,
            created_at: row.created_at,
            message: row.message,
        }
    }
}
