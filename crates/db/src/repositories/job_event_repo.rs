//! Repository for the `job_events` table.

use hopper_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::job_event::JobEvent;

/// Column list for `job_events` queries.
const COLUMNS: &str = "id, job_id, created_at, message";

/// Append-only access to a job's audit trail.
pub struct JobEventRepo;

impl JobEventRepo {
    /// Append an event to an existing job.
    ///
    /// Returns `None` if the job does not exist. Legal in every job state.
    pub async fn append(
        pool: &PgPool,
        job_id: DbId,
        message: &str,
    ) -> Result<Option<JobEvent>, sqlx::Error> {
        let query = format!(
            "INSERT INTO job_events (job_id, message) \
             SELECT id, $2 FROM jobs WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobEvent>(&query)
            .bind(job_id)
            .bind(message)
            .fetch_optional(pool)
            .await
    }

    /// All events for a job, oldest first.
    pub async fn list_for_job(
        pool: &PgPool,
        job_id: DbId,
    ) -> Result<Vec<JobEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM job_events \
             WHERE job_id = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, JobEvent>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }

    /// Insert an event on an open connection, typically inside the
    /// transaction that made the state change it describes.
    pub(crate) async fn insert(
        conn: &mut PgConnection,
        job_id: DbId,
        message: &str,
    ) -> Result<JobEvent, sqlx::Error> {
        let query = format!(
            "INSERT INTO job_events (job_id, message) VALUES ($1, $2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobEvent>(&query)
            .bind(job_id)
            .bind(message)
            .fetch_one(conn)
            .await
    }
}
