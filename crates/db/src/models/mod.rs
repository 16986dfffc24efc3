//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` entity matching the database row and
//! a conversion into the wire type from `hopper_core::protocol`.

pub mod job;
pub mod job_event;
pub mod request;
pub mod status;
