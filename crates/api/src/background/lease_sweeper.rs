//! Periodic expiry of abandoned claims.
//!
//! A worker that crashes mid-job leaves its job Processing forever. This
//! task fails any Processing job with no status write and no event for
//! longer than the lease. The job is never re-queued; a late report from
//! the original worker gets a 409.

use std::time::Duration;

use hopper_db::repositories::JobRepo;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// Run the lease sweep loop until `cancel` is triggered.
pub async fn run(pool: PgPool, lease_secs: u64, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        lease_secs,
        interval_secs = interval.as_secs(),
        "Lease sweeper started"
    );

    let mut interval = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Lease sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                match JobRepo::fail_expired_leases(&pool, lease_secs).await {
                    Ok(failed) if failed.is_empty() => {
                        tracing::debug!("Lease sweep: no expired jobs");
                    }
                    Ok(failed) => {
                        tracing::warn!(count = failed.len(), job_ids = ?failed, "Lease sweep: failed abandoned jobs");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Lease sweep failed");
                    }
                }
            }
        }
    }
}
