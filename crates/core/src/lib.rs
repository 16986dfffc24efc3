//! Shared domain logic for Hopper.
//!
//! Pure types and functions used by the dispatcher, the store and the
//! worker. This crate has no I/O and no internal dependencies.

pub mod error;
pub mod job_queue;
pub mod lifecycle;
pub mod protocol;
pub mod types;
