//! Integration tests for outcome reporting, the event trail, and lease expiry.

use assert_matches::assert_matches;
use hopper_core::protocol::Ingested;
use hopper_core::types::DbId;
use hopper_db::models::request::NewRequest;
use hopper_db::models::status::{JobOutcome, JobStatus};
use hopper_db::repositories::{JobEventRepo, JobRepo, RequestRepo, TransitionResult};
use sqlx::PgPool;

const LEASE_SECS: u64 = 3600;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn ingest(pool: &PgPool, tag: Option<&str>) -> Ingested {
    let input = NewRequest {
        source_ip: None,
        user_agent: None,
        method: "POST".to_string(),
        request_url: "/api/v1/request".to_string(),
        payload: serde_json::json!({ "clip": "intro.mp4" }),
        tag: tag.map(str::to_string),
    };
    RequestRepo::ingest(pool, &input).await.unwrap()
}

async fn ingest_and_claim(pool: &PgPool) -> Ingested {
    let ingested = ingest(pool, None).await;
    let (job, _) = JobRepo::claim_next(pool, None, Some("test/0"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.id, ingested.job_id);
    ingested
}

/// Make a Processing job look abandoned: no status write and no event for
/// two hours.
async fn age_job(pool: &PgPool, job_id: DbId) {
    sqlx::query("UPDATE jobs SET modified_at = NOW() - INTERVAL '2 hours' WHERE id = $1")
        .bind(job_id)
        .execute(pool)
        .await
        .unwrap();
    // Events are immutable, so drop the fresh trail rather than rewrite it.
    sqlx::query("DELETE FROM job_events WHERE job_id = $1")
        .bind(job_id)
        .execute(pool)
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Outcome reporting
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_full_scenario(pool: PgPool) {
    let ingested = ingest(&pool, Some("video")).await;

    let job = JobRepo::find_by_id(&pool, ingested.job_id).await.unwrap().unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::Pending);
    assert!(job.finished_at.is_none());

    let (job, _) = JobRepo::claim_next(&pool, Some("video"), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::Processing);
    assert!(JobRepo::claim_next(&pool, Some("video"), None)
        .await
        .unwrap()
        .is_none());

    let result = JobRepo::report_outcome(&pool, job.id, JobOutcome::Completed, "done")
        .await
        .unwrap();
    let finished = assert_matches!(result, TransitionResult::Applied(job) => job);
    assert_eq!(finished.status().unwrap(), JobStatus::Completed);
    assert!(finished.finished_at.is_some());
    assert!(finished.modified_at >= job.modified_at);

    let events = JobEventRepo::list_for_job(&pool, job.id).await.unwrap();
    assert_eq!(events.last().map(|e| e.message.as_str()), Some("done"));

    let request = RequestRepo::find_by_id(&pool, ingested.id).await.unwrap().unwrap();
    assert!(request.is_handled);
    assert!(!request.is_being_processed);

    let again = JobRepo::report_outcome(&pool, job.id, JobOutcome::Completed, "again")
        .await
        .unwrap();
    assert_matches!(
        again,
        TransitionResult::Conflict {
            current: JobStatus::Completed
        }
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn test_report_on_pending_job_conflicts(pool: PgPool) {
    let ingested = ingest(&pool, None).await;

    let result = JobRepo::report_outcome(&pool, ingested.job_id, JobOutcome::Failed, "nope")
        .await
        .unwrap();
    assert_matches!(
        result,
        TransitionResult::Conflict {
            current: JobStatus::Pending
        }
    );

    let job = JobRepo::find_by_id(&pool, ingested.job_id).await.unwrap().unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::Pending);
    assert!(job.finished_at.is_none());
    assert!(JobEventRepo::list_for_job(&pool, job.id)
        .await
        .unwrap()
        .is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_report_on_unknown_job(pool: PgPool) {
    let result = JobRepo::report_outcome(&pool, 999_999, JobOutcome::Completed, "done")
        .await
        .unwrap();
    assert_matches!(result, TransitionResult::NotFound);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_failed_outcome_leaves_request_unhandled(pool: PgPool) {
    let ingested = ingest_and_claim(&pool).await;

    let result = JobRepo::report_outcome(&pool, ingested.job_id, JobOutcome::Failed, "boom")
        .await
        .unwrap();
    let job = assert_matches!(result, TransitionResult::Applied(job) => job);
    assert_eq!(job.status().unwrap(), JobStatus::Failed);
    assert!(job.finished_at.is_some());

    let request = RequestRepo::find_by_id(&pool, ingested.id).await.unwrap().unwrap();
    assert!(!request.is_handled);
    assert!(!request.is_being_processed);

    // Terminal job: the request is not dispatched again.
    assert!(JobRepo::claim_next(&pool, None, None).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_report_after_request_deleted(pool: PgPool) {
    let ingested = ingest_and_claim(&pool).await;
    RequestRepo::delete(&pool, ingested.id).await.unwrap();

    let result = JobRepo::report_outcome(&pool, ingested.job_id, JobOutcome::Completed, "done")
        .await
        .unwrap();
    let job = assert_matches!(result, TransitionResult::Applied(job) => job);
    assert_eq!(job.request_id, None);
    assert_eq!(job.status().unwrap(), JobStatus::Completed);
}

// ---------------------------------------------------------------------------
// Event trail
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_events_are_ordered_and_allowed_in_any_state(pool: PgPool) {
    let ingested = ingest(&pool, None).await;
    let job_id = ingested.job_id;

    JobEventRepo::append(&pool, job_id, "queued note").await.unwrap().unwrap();
    JobRepo::claim_next(&pool, None, None).await.unwrap().unwrap();
    JobEventRepo::append(&pool, job_id, "50%").await.unwrap().unwrap();
    JobRepo::report_outcome(&pool, job_id, JobOutcome::Completed, "done")
        .await
        .unwrap();
    JobEventRepo::append(&pool, job_id, "post-mortem").await.unwrap().unwrap();

    let events = JobEventRepo::list_for_job(&pool, job_id).await.unwrap();
    let messages: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages.len(), 5);
    assert_eq!(messages[0], "queued note");
    assert!(messages[1].contains("claimed"));
    assert_eq!(&messages[2..], ["50%", "done", "post-mortem"]);

    assert!(events.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_append_to_missing_job(pool: PgPool) {
    let event = JobEventRepo::append(&pool, 424_242, "hello").await.unwrap();
    assert!(event.is_none());
}

// ---------------------------------------------------------------------------
// Lease expiry
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_expired_lease_fails_job(pool: PgPool) {
    let ingested = ingest_and_claim(&pool).await;
    age_job(&pool, ingested.job_id).await;

    let failed = JobRepo::fail_expired_leases(&pool, LEASE_SECS).await.unwrap();
    assert_eq!(failed, vec![ingested.job_id]);

    let job = JobRepo::find_by_id(&pool, ingested.job_id).await.unwrap().unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::Failed);
    assert!(job.finished_at.is_some());

    let request = RequestRepo::find_by_id(&pool, ingested.id).await.unwrap().unwrap();
    assert!(!request.is_being_processed);
    assert!(!request.is_handled);

    let events = JobEventRepo::list_for_job(&pool, job.id).await.unwrap();
    assert!(events[0].message.starts_with("Lease expired"));

    // The original worker reporting late loses.
    let late = JobRepo::report_outcome(&pool, job.id, JobOutcome::Completed, "done")
        .await
        .unwrap();
    assert_matches!(
        late,
        TransitionResult::Conflict {
            current: JobStatus::Failed
        }
    );

    // Never re-queued.
    assert!(JobRepo::claim_next(&pool, None, None).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_recent_event_renews_lease(pool: PgPool) {
    let ingested = ingest_and_claim(&pool).await;
    age_job(&pool, ingested.job_id).await;
    JobEventRepo::append(&pool, ingested.job_id, "still rendering")
        .await
        .unwrap()
        .unwrap();

    let failed = JobRepo::fail_expired_leases(&pool, LEASE_SECS).await.unwrap();
    assert!(failed.is_empty());

    let job = JobRepo::find_by_id(&pool, ingested.job_id).await.unwrap().unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::Processing);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_fresh_and_pending_jobs_are_left_alone(pool: PgPool) {
    ingest_and_claim(&pool).await;
    let pending = ingest(&pool, None).await;
    sqlx::query("UPDATE jobs SET modified_at = NOW() - INTERVAL '2 hours' WHERE id = $1")
        .bind(pending.job_id)
        .execute(&pool)
        .await
        .unwrap();

    let failed = JobRepo::fail_expired_leases(&pool, LEASE_SECS).await.unwrap();
    assert!(failed.is_empty());
}
