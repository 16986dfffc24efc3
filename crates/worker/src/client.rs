//! HTTP client for the dispatcher's job protocol.
//!
//! Wraps the `/api/v1` endpoints a worker needs (claim, report, events)
//! using [`reqwest`], and maps dispatcher responses onto [`ClientError`].

use std::time::Duration;

use hopper_core::job_queue::WORKER_ID_HEADER;
use hopper_core::lifecycle::JobOutcome;
use hopper_core::protocol::{
    ClaimedJob, EventSnapshot, Ingested, InsertEvent, JobDetail, JobSnapshot, MessageResponse,
    TagFilter, UpdateJobStatus,
};
use hopper_core::types::DbId;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// `{ "data": T }` envelope used by every successful dispatcher response.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// `{ "error": ..., "code": ... }` body of a dispatcher error response.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Errors from the dispatcher client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The dispatcher rejected our authorization key.
    #[error("Dispatcher rejected the authorization key")]
    Unauthorized,

    /// The job or request does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The job is no longer in a state that accepts this call, typically
    /// because the claim was lost to the lease sweeper.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other 4xx: the call itself was malformed.
    #[error("Dispatcher rejected the call ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// 5xx from the dispatcher, including store unavailability.
    #[error("Dispatcher error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The HTTP request itself failed (connect, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A success response whose body did not match the protocol.
    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl ClientError {
    /// Whether retrying the same call later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::Server { .. }
        )
    }
}

/// HTTP client for one dispatcher. Cheap to clone; clones share the
/// connection pool.
#[derive(Debug, Clone)]
pub struct DispatcherClient {
    client: reqwest::Client,
    api_url: String,
    bearer: String,
}

impl DispatcherClient {
    /// Create a client for the dispatcher at `base_url`
    /// (e.g. `http://host:3000`).
    pub fn new(
        base_url: &str,
        authorization_key: &str,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, authorization_key))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str, authorization_key: &str) -> Self {
        Self {
            client,
            api_url: format!("{}/api/v1", base_url.trim_end_matches('/')),
            bearer: format!("Bearer {authorization_key}"),
        }
    }

    /// Claim the next pending job.
    ///
    /// Returns `Ok(None)` when the dispatcher reports an empty queue.
    pub async fn claim_next(
        &self,
        tag: Option<&str>,
        worker_id: &str,
    ) -> Result<Option<ClaimedJob>, ClientError> {
        let filter = TagFilter {
            tag: tag.map(str::to_string),
        };
        let response = self
            .client
            .get(format!("{}/jobs/next-pending", self.api_url))
            .header(reqwest::header::AUTHORIZATION, &self.bearer)
            .header(WORKER_ID_HEADER, worker_id)
            .query(&filter)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            let body = response.text().await?;
            // The empty-queue answer is a plain message, not an error body.
            return match serde_json::from_str::<MessageResponse>(&body) {
                Ok(_) => Ok(None),
                Err(_) => Err(ClientError::NotFound(error_message(&body))),
            };
        }

        Self::parse_response(response).await.map(Some)
    }

    /// Report the terminal outcome of a claimed job.
    pub async fn report_outcome(
        &self,
        job_id: DbId,
        outcome: JobOutcome,
        message: &str,
    ) -> Result<JobSnapshot, ClientError> {
        let body = UpdateJobStatus {
            status: outcome.status(),
            message: Some(message.to_string()),
        };
        let response = self
            .client
            .put(format!("{}/jobs/{job_id}/update-status", self.api_url))
            .header(reqwest::header::AUTHORIZATION, &self.bearer)
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Append an event to a job's trail.
    pub async fn insert_event(
        &self,
        job_id: DbId,
        message: &str,
    ) -> Result<EventSnapshot, ClientError> {
        let body = InsertEvent {
            message: message.to_string(),
        };
        let response = self
            .client
            .post(format!("{}/jobs/{job_id}/insert-event", self.api_url))
            .header(reqwest::header::AUTHORIZATION, &self.bearer)
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch a job with its event trail.
    pub async fn get_job(&self, job_id: DbId) -> Result<JobDetail, ClientError> {
        let response = self
            .client
            .get(format!("{}/jobs/{job_id}", self.api_url))
            .header(reqwest::header::AUTHORIZATION, &self.bearer)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Submit a payload for processing, as an upstream caller would.
    pub async fn ingest(
        &self,
        tag: Option<&str>,
        payload: &serde_json::Value,
    ) -> Result<Ingested, ClientError> {
        let filter = TagFilter {
            tag: tag.map(str::to_string),
        };
        let response = self
            .client
            .post(format!("{}/request", self.api_url))
            .header(reqwest::header::AUTHORIZATION, &self.bearer)
            .query(&filter)
            .json(payload)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Map a non-2xx response onto [`ClientError`], or decode the `data`
    /// envelope of a successful one.
    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify(status, &body));
        }

        serde_json::from_str::<Envelope<T>>(&body)
            .map(|envelope| envelope.data)
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

fn classify(status: StatusCode, body: &str) -> ClientError {
    let message = error_message(body);
    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::CONFLICT => ClientError::Conflict(message),
        s if s.is_server_error() => ClientError::Server {
            status: s.as_u16(),
            message,
        },
        s => ClientError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

/// Pull the human-readable message out of an error body, falling back to
/// the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.to_string())
}
