//! Hopper worker library.
//!
//! A [`WorkerPool`] runs N independent pollers against a dispatcher. Each
//! poller claims a job over HTTP, hands it to a [`JobProcessor`], and
//! reports the outcome. Payload semantics belong entirely to the processor.

pub mod client;
pub mod config;
pub mod pool;
pub mod processor;

pub use client::{ClientError, DispatcherClient};
pub use config::WorkerConfig;
pub use pool::{BackoffPolicy, PoolSummary, WorkerPool};
pub use processor::{JobContext, JobProcessor, ProcessError};
