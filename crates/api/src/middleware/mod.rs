//! Request extractors shared by handlers.
//!
//! - [`auth::BearerAuth`] -- Requires the configured shared authorization key.
//! - [`request_meta::ClientAddr`] -- Best-effort caller address.
//! - [`request_meta::WorkerId`] -- Optional poller identity header.

pub mod auth;
pub mod request_meta;
