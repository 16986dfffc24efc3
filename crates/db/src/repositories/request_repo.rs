//! Repository for the `requests` table.

use hopper_core::protocol::{Ingested, UpdateRequest};
use hopper_core::types::DbId;
use sqlx::PgPool;

use crate::models::request::{NewRequest, Request};
use crate::models::status::JobStatus;

/// Column list for `requests` queries.
pub(crate) const COLUMNS: &str = "\
    id, received_at, source_ip, user_agent, method, request_url, \
    payload, tag, is_handled, is_being_processed";

/// Provides ingest and administrative operations for inbound requests.
pub struct RequestRepo;

impl RequestRepo {
    /// Persist an inbound request together with its Pending job.
    ///
    /// Both rows are written in one transaction, so a request is never
    /// visible without the job that will process it.
    pub async fn ingest(pool: &PgPool, input: &NewRequest) -> Result<Ingested, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let request_id: DbId = sqlx::query_scalar(
            "INSERT INTO requests \
                 (source_ip, user_agent, method, request_url, payload, tag) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id",
        )
        .bind(&input.source_ip)
        .bind(&input.user_agent)
        .bind(&input.method)
        .bind(&input.request_url)
        .bind(&input.payload)
        .bind(&input.tag)
        .fetch_one(&mut *tx)
        .await?;

        let job_id: DbId = sqlx::query_scalar(
            "INSERT INTO jobs (request_id, status_id) VALUES ($1, $2) RETURNING id",
        )
        .bind(request_id)
        .bind(JobStatus::Pending.id())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Ingested {
            id: request_id,
            job_id,
        })
    }

    /// Find a request by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Request>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM requests WHERE id = $1");
        sqlx::query_as::<_, Request>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Administrative edit. Returns the updated row, or `None` if not found.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateRequest,
    ) -> Result<Option<Request>, sqlx::Error> {
        let query = format!(
            "UPDATE requests SET \
                 is_handled = COALESCE($2, is_handled) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Request>(&query)
            .bind(id)
            .bind(input.is_handled)
            .fetch_optional(pool)
            .await
    }

    /// Delete a request. Its job and event trail survive with
    /// `request_id` set to NULL. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM requests WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
