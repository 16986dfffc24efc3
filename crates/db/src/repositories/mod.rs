//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Multi-row state changes run in a
//! single transaction inside the repository; callers never see a partial
//! write.

pub mod job_event_repo;
pub mod job_repo;
pub mod request_repo;

pub use job_event_repo::JobEventRepo;
pub use job_repo::{JobRepo, QueueDepth, TransitionResult};
pub use request_repo::RequestRepo;
