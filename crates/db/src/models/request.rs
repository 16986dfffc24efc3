//! Inbound request entity and the ingest DTO.

use hopper_core::protocol::RequestSnapshot;
use hopper_core::types::{DbId, Payload, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `requests` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Request {
    pub id: DbId,
    pub received_at: Timestamp,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub method: String,
    pub request_url: String,
    pub payload: Payload,
    pub tag: Option<String>,
    pub is_handled: bool,
    pub is_being_processed: bool,
}

/// Everything captured from an inbound HTTP call by `POST /request`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRequest {
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub method: String,
    pub request_url: String,
    pub payload: Payload,
    pub tag: Option<String>,
}

impl From<Request> for RequestSnapshot {
    fn from(row: Request) -> Self {
        RequestSnapshot {
            id: row.id,
            received_at: row.received_at,
            source_ip: row.source_ip,
            user_agent: row.user_agent,
            method: row.method,
            request_url: row.request_url,
            payload: row.payload,
            tag: row.tag,
            is_handled: row.is_handled,
            is_being_processed: row.is_being_processed,
        }
    }
}
