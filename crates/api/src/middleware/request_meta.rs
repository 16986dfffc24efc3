//! Extractors for caller metadata that never reject a request on their own.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use hopper_core::job_queue::{validate_worker_id, WORKER_ID_HEADER};

use crate::error::AppError;

/// Caller address: the TCP peer when the server was started with connect
/// info, otherwise the first `X-Forwarded-For` entry, otherwise `None`.
#[derive(Debug, Clone)]
pub struct ClientAddr(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            return Ok(ClientAddr(Some(addr.ip().to_string())));
        }

        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        Ok(ClientAddr(forwarded))
    }
}

/// Identity a poller sends in the `X-Worker-Id` header. Absent is fine;
/// present but malformed is a 400.
#[derive(Debug, Clone)]
pub struct WorkerId(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for WorkerId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(WORKER_ID_HEADER) else {
            return Ok(WorkerId(None));
        };

        let worker = value
            .to_str()
            .map_err(|_| AppError::BadRequest(format!("{WORKER_ID_HEADER} must be ASCII")))?;
        validate_worker_id(worker)?;
        Ok(WorkerId(Some(worker.to_string())))
    }
}
