//! Hopper dispatcher library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! background tasks) so integration tests, the worker crate's end-to-end
//! tests, and the binary entrypoint all share one router.

pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
