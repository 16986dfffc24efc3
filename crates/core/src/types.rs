//! Primitive aliases shared by every crate.

/// Row id of requests, jobs and events (`BIGSERIAL`).
pub type DbId = i64;

/// UTC instant, stored as `TIMESTAMPTZ`.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque request body. Only a job processor interprets it.
pub type Payload = serde_json::Value;
