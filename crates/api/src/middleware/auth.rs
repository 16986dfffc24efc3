//! Shared-key bearer authorization extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use hopper_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// Message returned for every authorization failure. Callers learn nothing
/// about whether the header was missing, malformed, or wrong.
pub const UNAUTHORIZED_MESSAGE: &str = "Invalid or missing authorization";

/// Proof that the request carried `Authorization: Bearer <key>` matching
/// the configured key.
///
/// Extracted before the body, so a rejected request never touches the store:
///
/// ```ignore
/// async fn my_handler(_auth: BearerAuth, State(state): State<AppState>) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BearerAuth;

impl FromRequestParts<AppState> for BearerAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match presented {
            Some(token) if keys_match(token, &state.config.authorization_key) => Ok(BearerAuth),
            _ => {
                tracing::debug!(path = %parts.uri.path(), "Rejected unauthorized request");
                Err(AppError::Core(CoreError::Unauthorized(
                    UNAUTHORIZED_MESSAGE.into(),
                )))
            }
        }
    }
}

/// Compare without short-circuiting on the first differing byte.
fn keys_match(presented: &str, expected: &str) -> bool {
    let (a, b) = (presented.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
