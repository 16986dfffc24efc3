//! Job lifecycle state machine.
//!
//! ```text
//! Pending ──claim──▶ Processing ──report──▶ Completed
//!                               └─report──▶ Failed
//! ```
//!
//! Pending and Processing are the only non-terminal states. The store
//! re-validates every transition under a row lock, so these rules hold
//! across processes, not just inside one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Status ID type matching SMALLINT in the `job_statuses` lookup table.
pub type StatusId = i16;

/// Job execution status.
///
/// Each discriminant matches the seed row id in `job_statuses`.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Pending = 1,
    Processing = 2,
    Completed = 3,
    Failed = 4,
}

impl JobStatus {
    /// Every status, in lookup-table order.
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Look up a status by its database ID.
    pub fn from_id(id: StatusId) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    /// Human-readable name, also used on the wire.
    pub fn name(self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Processing => "Processing",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
        }
    }

    /// Terminal statuses carry a `finished_at` timestamp and never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Can a job move from `self` to `to`?
    pub fn can_transition_to(self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Pending, Processing) | (Processing, Completed) | (Processing, Failed)
        )
    }
}

impl From<JobStatus> for StatusId {
    fn from(value: JobStatus) -> Self {
        value as StatusId
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    /// Parse a status name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::Validation(format!("Unknown job status: \"{s}\"")))
    }
}

/// A terminal result a worker can report for a job it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobOutcome {
    Completed,
    Failed,
}

impl JobOutcome {
    /// The terminal status this outcome moves a job into.
    pub fn status(self) -> JobStatus {
        match self {
            JobOutcome::Completed => JobStatus::Completed,
            JobOutcome::Failed => JobStatus::Failed,
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.status().fmt(f)
    }
}

impl TryFrom<JobStatus> for JobOutcome {
    type Error = CoreError;

    /// Outcome reports may only target a terminal status; anything else is
    /// a malformed request rather than a state conflict.
    fn try_from(status: JobStatus) -> Result<Self, Self::Error> {
        match status {
            JobStatus::Completed => Ok(JobOutcome::Completed),
            JobStatus::Failed => Ok(JobOutcome::Failed),
            other => Err(CoreError::Validation(format!(
                "Outcome status must be Completed or Failed, got {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
