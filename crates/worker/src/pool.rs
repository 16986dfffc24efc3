//! Fixed-size pool of pollers.
//!
//! Every poller runs the same loop on its own tokio task: claim a job,
//! record a start event, run the [`JobProcessor`], report the outcome. An
//! empty queue or an unreachable dispatcher puts the poller to sleep for
//! the matching [`BackoffPolicy`] delay. Cancellation is only observed
//! between cycles and during those sleeps, so a job that has been claimed
//! is always processed and reported.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use hopper_core::job_queue::{
    completed_message, failed_message, started_message, truncate_message,
    DEFAULT_POLL_ERROR_MS, DEFAULT_POLL_IDLE_MS,
};
use hopper_core::lifecycle::JobOutcome;
use hopper_core::types::DbId;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::client::{ClientError, DispatcherClient};
use crate::config::{poller_identity, WorkerConfig};
use crate::processor::{JobContext, JobProcessor};

/// Attempts made to deliver an outcome report before giving up on it.
const REPORT_ATTEMPTS: u32 = 3;

/// How long a poller sleeps before polling again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// After the dispatcher reports an empty queue.
    pub idle: Duration,
    /// After a failed dispatcher call.
    pub error: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            idle: Duration::from_millis(DEFAULT_POLL_IDLE_MS),
            error: Duration::from_millis(DEFAULT_POLL_ERROR_MS),
        }
    }
}

/// Jobs handled by a pool over its lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolSummary {
    /// Reported Completed.
    pub completed: u64,
    /// Reported Failed (processor error or panic).
    pub failed: u64,
    /// Claims rejected at report time, usually after the lease expired.
    pub lost: u64,
}

impl PoolSummary {
    fn merge(&mut self, other: PoolSummary) {
        self.completed += other.completed;
        self.failed += other.failed;
        self.lost += other.lost;
    }
}

/// Result of one claim/process/report cycle.
enum Cycle {
    Idle,
    Reported(JobOutcome),
    Lost,
}

struct Shared<P> {
    client: DispatcherClient,
    processor: P,
    tag: Option<String>,
    backoff: BackoffPolicy,
}

/// A pool of pollers sharing one [`DispatcherClient`] and one processor.
pub struct WorkerPool<P> {
    client: DispatcherClient,
    processor: P,
    worker_name: String,
    worker_count: usize,
    tag: Option<String>,
    backoff: BackoffPolicy,
}

impl<P: JobProcessor> WorkerPool<P> {
    /// Create a pool of `worker_count` pollers with default backoff and no
    /// tag filter.
    pub fn new(
        client: DispatcherClient,
        processor: P,
        worker_name: impl Into<String>,
        worker_count: usize,
    ) -> Self {
        Self {
            client,
            processor,
            worker_name: worker_name.into(),
            worker_count: worker_count.max(1),
            tag: None,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Create a pool sized and filtered according to `config`.
    pub fn from_config(client: DispatcherClient, processor: P, config: &WorkerConfig) -> Self {
        Self::new(client, processor, config.worker_name.clone(), config.worker_count)
            .with_tag(config.tag.clone())
            .with_backoff(config.backoff)
    }

    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Run every poller until `cancel` fires, then wait for in-flight jobs
    /// to be reported.
    pub async fn run(self, cancel: CancellationToken) -> PoolSummary {
        tracing::info!(
            worker = %self.worker_name,
            pollers = self.worker_count,
            tag = self.tag.as_deref().unwrap_or("-"),
            "Worker pool started",
        );

        let shared = Arc::new(Shared {
            client: self.client,
            processor: self.processor,
            tag: self.tag,
            backoff: self.backoff,
        });

        let mut pollers = JoinSet::new();
        for index in 0..self.worker_count {
            let identity = poller_identity(&self.worker_name, index);
            let span = tracing::info_span!("poller", poller = %identity);
            pollers.spawn(
                poll_loop(Arc::clone(&shared), identity, cancel.clone()).instrument(span),
            );
        }

        let mut summary = PoolSummary::default();
        while let Some(result) = pollers.join_next().await {
            match result {
                Ok(stats) => summary.merge(stats),
                Err(e) => tracing::error!(error = %e, "Poller task ended abnormally"),
            }
        }

        tracing::info!(
            completed = summary.completed,
            failed = summary.failed,
            lost = summary.lost,
            "Worker pool stopped",
        );
        summary
    }
}

async fn poll_loop<P: JobProcessor>(
    shared: Arc<Shared<P>>,
    identity: String,
    cancel: CancellationToken,
) -> PoolSummary {
    let mut stats = PoolSummary::default();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let pause = match shared.cycle(&identity).await {
            Ok(Cycle::Idle) => Some(shared.backoff.idle),
            Ok(Cycle::Reported(JobOutcome::Completed)) => {
                stats.completed += 1;
                None
            }
            Ok(Cycle::Reported(JobOutcome::Failed)) => {
                stats.failed += 1;
                None
            }
            Ok(Cycle::Lost) => {
                stats.lost += 1;
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dispatcher call failed");
                Some(shared.backoff.error)
            }
        };

        if let Some(pause) = pause {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    tracing::debug!("Poller stopped");
    stats
}

impl<P: JobProcessor> Shared<P> {
    async fn cycle(&self, identity: &str) -> Result<Cycle, ClientError> {
        let Some(claimed) = self.client.claim_next(self.tag.as_deref(), identity).await? else {
            return Ok(Cycle::Idle);
        };
        let job_id = claimed.job.id;
        let request_id = claimed.request.id;
        tracing::info!(job_id, request_id, "Claimed job");

        // A missing start event only thins the audit trail.
        if let Err(e) = self
            .client
            .insert_event(job_id, &started_message(job_id, request_id))
            .await
        {
            tracing::warn!(job_id, error = %e, "Failed to record start event");
        }

        let ctx = JobContext::new(self.client.clone(), job_id, identity.to_string());
        let result = AssertUnwindSafe(self.processor.process(&ctx, &claimed))
            .catch_unwind()
            .await;

        let (outcome, message) = match result {
            Ok(Ok(())) => (JobOutcome::Completed, completed_message(job_id)),
            Ok(Err(e)) => {
                tracing::warn!(job_id, error = %e, "Processor failed");
                (JobOutcome::Failed, failure_message(job_id, &e.to_string()))
            }
            Err(panic) => {
                let text = panic_text(panic.as_ref());
                tracing::error!(job_id, panic = %text, "Processor panicked");
                (
                    JobOutcome::Failed,
                    truncate_message(&format!("Processor panicked: {text}")),
                )
            }
        };

        self.report(job_id, outcome, &message).await
    }

    async fn report(
        &self,
        job_id: DbId,
        outcome: JobOutcome,
        message: &str,
    ) -> Result<Cycle, ClientError> {
        let mut attempt = 1;
        loop {
            match self.client.report_outcome(job_id, outcome, message).await {
                Ok(_) => {
                    tracing::info!(job_id, %outcome, "Reported outcome");
                    return Ok(Cycle::Reported(outcome));
                }
                Err(ClientError::Conflict(reason)) => {
                    tracing::warn!(job_id, %outcome, %reason, "Claim lost before report");
                    return Ok(Cycle::Lost);
                }
                Err(e) if e.is_transient() && attempt < REPORT_ATTEMPTS => {
                    tracing::warn!(job_id, attempt, error = %e, "Outcome report failed, retrying");
                    tokio::time::sleep(self.backoff.error).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(job_id, %outcome, error = %e, "Giving up on outcome report");
                    return Err(e);
                }
            }
        }
    }
}

/// Event message for a processor error. The dispatcher rejects blank
/// messages, so blank error text falls back to the default.
fn failure_message(job_id: DbId, error: &str) -> String {
    if error.trim().is_empty() {
        failed_message(job_id)
    } else {
        truncate_message(error)
    }
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
