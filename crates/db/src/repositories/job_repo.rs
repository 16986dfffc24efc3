//! Repository for the `jobs` table.
//!
//! Every status write goes through [`JobStatus`] ids and is re-validated
//! against the lifecycle while the job row is locked.

use hopper_core::job_queue::{claimed_message, lease_expired_message};
use hopper_core::types::DbId;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use crate::models::job::Job;
use crate::models::request::Request;
use crate::models::status::{JobOutcome, JobStatus, StatusId};
use crate::repositories::job_event_repo::JobEventRepo;
use crate::repositories::request_repo;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, request_id, status_id, claimed_by, created_at, modified_at, finished_at";

/// Result of asking the store to move a job into a terminal status.
#[derive(Debug)]
pub enum TransitionResult {
    /// The transition was applied; carries the updated row.
    Applied(Job),
    /// No job with that id exists.
    NotFound,
    /// The lifecycle does not allow the move from `current`.
    Conflict { current: JobStatus },
}

/// Number of jobs waiting and in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueDepth {
    pub pending: i64,
    pub processing: i64,
}

/// Provides claim, outcome, and lookup operations for jobs.
pub struct JobRepo;

impl JobRepo {
    /// Atomically claim the oldest eligible pending job.
    ///
    /// A job is eligible when it is Pending and its request still exists,
    /// is not handled, is not being processed, and matches `tag` if one is
    /// given. Uses `FOR UPDATE ... SKIP LOCKED` on both rows so concurrent
    /// claimants never receive the same job and never wait on each other.
    ///
    /// The status change, the request flag, and the claim event commit
    /// together. Returns `None` when nothing is eligible.
    pub async fn claim_next(
        pool: &PgPool,
        tag: Option<&str>,
        claimed_by: Option<&str>,
    ) -> Result<Option<(Job, Request)>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let candidate: Option<(DbId, DbId)> = sqlx::query_as(
            "SELECT j.id, r.id FROM jobs j \
             JOIN requests r ON r.id = j.request_id \
             WHERE j.status_id = $1 \
               AND r.is_handled = FALSE \
               AND r.is_being_processed = FALSE \
               AND ($2::TEXT IS NULL OR r.tag = $2) \
             ORDER BY j.created_at ASC, j.id ASC \
             LIMIT 1 \
             FOR UPDATE OF j, r SKIP LOCKED",
        )
        .bind(JobStatus::Pending.id())
        .bind(tag)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((job_id, request_id)) = candidate else {
            tx.rollback().await?;
            return Ok(None);
        };

        let query = format!(
            "UPDATE jobs \
             SET status_id = $2, claimed_by = $3, \
                 modified_at = GREATEST(modified_at, NOW()) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let job = sqlx::query_as::<_, Job>(&query)
            .bind(job_id)
            .bind(JobStatus::Processing.id())
            .bind(claimed_by)
            .fetch_one(&mut *tx)
            .await?;

        let query = format!(
            "UPDATE requests SET is_being_processed = TRUE \
             WHERE id = $1 \
             RETURNING {}",
            request_repo::COLUMNS
        );
        let request = sqlx::query_as::<_, Request>(&query)
            .bind(request_id)
            .fetch_one(&mut *tx)
            .await?;

        JobEventRepo::insert(
            &mut *tx,
            job_id,
            &claimed_message(job_id, request_id, claimed_by),
        )
        .await?;

        tx.commit().await?;
        Ok(Some((job, request)))
    }

    /// Move a Processing job into a terminal status and record `message`.
    ///
    /// The job row is locked first so the lifecycle check and the write
    /// see the same status. A Completed outcome also marks the request
    /// handled; both outcomes release the request's processing flag.
    pub async fn report_outcome(
        pool: &PgPool,
        job_id: DbId,
        outcome: JobOutcome,
        message: &str,
    ) -> Result<TransitionResult, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let current: Option<(StatusId, Option<DbId>)> =
            sqlx::query_as("SELECT status_id, request_id FROM jobs WHERE id = $1 FOR UPDATE")
                .bind(job_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((status_id, request_id)) = current else {
            tx.rollback().await?;
            return Ok(TransitionResult::NotFound);
        };

        let current = decode_status(job_id, status_id)?;
        if !current.can_transition_to(outcome.status()) {
            tracing::debug!(job_id, %current, %outcome, "Outcome does not fit job status");
            tx.rollback().await?;
            return Ok(TransitionResult::Conflict { current });
        }

        let job = finish(&mut *tx, job_id, request_id, outcome, message).await?;
        tx.commit().await?;
        Ok(TransitionResult::Applied(job))
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Count Pending and Processing jobs.
    ///
    /// Status ids are inlined so the planner can use the partial status
    /// indexes.
    pub async fn queue_depth(pool: &PgPool) -> Result<QueueDepth, sqlx::Error> {
        let query = format!(
            "SELECT \
                 (SELECT COUNT(*) FROM jobs WHERE status_id = {}), \
                 (SELECT COUNT(*) FROM jobs WHERE status_id = {})",
            JobStatus::Pending.id(),
            JobStatus::Processing.id(),
        );
        let (pending, processing): (i64, i64) =
            sqlx::query_as(&query).fetch_one(pool).await?;

        Ok(QueueDepth {
            pending,
            processing,
        })
    }

    /// Fail every Processing job that has shown no sign of life for
    /// `lease_secs`: neither a status write nor an event.
    ///
    /// Jobs currently locked by a concurrent report are skipped and looked
    /// at again on the next sweep. Returns the ids of the failed jobs.
    pub async fn fail_expired_leases(
        pool: &PgPool,
        lease_secs: u64,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let expired: Vec<(DbId, Option<DbId>)> = sqlx::query_as(
            "SELECT j.id, j.request_id FROM jobs j \
             WHERE j.status_id = $1 \
               AND j.modified_at < NOW() - make_interval(secs => $2) \
               AND NOT EXISTS ( \
                   SELECT 1 FROM job_events e \
                   WHERE e.job_id = j.id \
                     AND e.created_at >= NOW() - make_interval(secs => $2) \
               ) \
             ORDER BY j.id \
             FOR UPDATE OF j SKIP LOCKED",
        )
        .bind(JobStatus::Processing.id())
        .bind(lease_secs as f64)
        .fetch_all(&mut *tx)
        .await?;

        let message = lease_expired_message(lease_secs);
        let mut failed = Vec::with_capacity(expired.len());
        for (job_id, request_id) in expired {
            finish(&mut *tx, job_id, request_id, JobOutcome::Failed, &message).await?;
            tracing::warn!(job_id, lease_secs, "Failing job with expired lease");
            failed.push(job_id);
        }

        tx.commit().await?;
        Ok(failed)
    }
}

/// Apply a terminal outcome to a job that is already locked and known to
/// be Processing.
async fn finish(
    conn: &mut PgConnection,
    job_id: DbId,
    request_id: Option<DbId>,
    outcome: JobOutcome,
    message: &str,
) -> Result<Job, sqlx::Error> {
    let query = format!(
        "UPDATE jobs \
         SET status_id = $2, finished_at = NOW(), \
             modified_at = GREATEST(modified_at, NOW()) \
         WHERE id = $1 \
         RETURNING {COLUMNS}"
    );
    let job = sqlx::query_as::<_, Job>(&query)
        .bind(job_id)
        .bind(outcome.status().id())
        .fetch_one(&mut *conn)
        .await?;

    if let Some(request_id) = request_id {
        sqlx::query(
            "UPDATE requests \
             SET is_being_processed = FALSE, is_handled = is_handled OR $2 \
             WHERE id = $1",
        )
        .bind(request_id)
        .bind(outcome == JobOutcome::Completed)
        .execute(&mut *conn)
        .await?;
    }

    JobEventRepo::insert(conn, job_id, message).await?;
    Ok(job)
}

fn decode_status(job_id: DbId, status_id: StatusId) -> Result<JobStatus, sqlx::Error> {
    JobStatus::from_id(status_id).ok_or_else(|| {
        sqlx::Error::Protocol(format!("job {job_id} has unknown status id {status_id}"))
    })
}
