//! Status lookup types, re-exported so repositories and handlers can keep
//! importing them from `models::status`.

pub use hopper_core::lifecycle::{JobOutcome, JobStatus, StatusId};
