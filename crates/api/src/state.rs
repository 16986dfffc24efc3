use std::sync::Arc;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable. Handlers keep nothing between calls; everything that
/// matters lives in the database.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: hopper_db::DbPool,
    /// Server configuration (authorization key, lease settings).
    pub config: Arc<ServerConfig>,
}
