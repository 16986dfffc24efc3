//! The processing callback contract.

use async_trait::async_trait;
use hopper_core::job_queue::truncate_message;
use hopper_core::protocol::ClaimedJob;
use hopper_core::types::DbId;

use crate::client::{ClientError, DispatcherClient};

/// Why processing a job failed.
///
/// The `Display` text becomes the message of the job's Failed event.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("{0}")]
    Failed(String),

    #[error("Dispatcher call failed during processing: {0}")]
    Dispatcher(#[from] ClientError),
}

impl ProcessError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Business logic run for each claimed job.
///
/// Return `Ok(())` to report the job Completed and `Err` to report it
/// Failed. A panic is caught by the pool and reported as Failed too.
#[async_trait]
pub trait JobProcessor: Send + Sync + 'static {
    async fn process(&self, ctx: &JobContext, job: &ClaimedJob) -> Result<(), ProcessError>;
}

/// Handle given to a [`JobProcessor`] for the job it is working on.
#[derive(Debug, Clone)]
pub struct JobContext {
    client: DispatcherClient,
    job_id: DbId,
    poller: String,
}

impl JobContext {
    pub(crate) fn new(client: DispatcherClient, job_id: DbId, poller: String) -> Self {
        Self {
            client,
            job_id,
            poller,
        }
    }

    pub fn job_id(&self) -> DbId {
        self.job_id
    }

    /// Identity of the poller running this job (`<name>/<n>`).
    pub fn poller(&self) -> &str {
        &self.poller
    }

    /// Append a progress event to the job's trail.
    ///
    /// Each event also renews the job's lease.
    pub async fn progress(&self, message: &str) -> Result<(), ClientError> {
        self.client
            .insert_event(self.job_id, &truncate_message(message))
            .await?;
        Ok(())
    }
}
