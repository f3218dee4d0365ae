//! Bearer token authentication
//!
//! When the server has a token configured, every `/api` request must carry it
//! in an `Authorization: Bearer <token>` header.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

/// Middleware rejecting requests without the configured token
pub async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let Some(expected) = state.token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(token) if token_matches(token, expected) => {}
        Some(_) => {
            tracing::warn!("Rejected request to {} with invalid token", request.uri());
            return Err(ApiError::Unauthorized("invalid token".to_string()));
        }
        None => return Err(ApiError::Unauthorized("missing bearer token".to_string())),
    }

    Ok(next.run(request).await)
}

/// Compares tokens in constant time for equal lengths
fn token_matches(provided: &str, expected: &str) -> bool {
    provided.len() == expected.len()
        && bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}
