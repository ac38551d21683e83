//! Request error → HTTP response mapping
//!
//! Per-request failures are returned as typed errors from the handlers and
//! rendered here, so one bad request never takes the process down. The
//! browser gets a generic message; the full error (including raw upstream
//! bodies) goes to the log only.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use spotify_client::RequestError;
use thiserror::Error;
use tracing::warn;

/// Failures a relay handler can produce.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Request(#[from] RequestError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            ApiError::Request(RequestError::InvalidToken) => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Invalid or missing token".into(),
            ),
            ApiError::Request(RequestError::RefreshFailed(_)) => (
                StatusCode::UNAUTHORIZED,
                "authentication_failed",
                "Authentication failed, please log in again".into(),
            ),
            ApiError::Request(RequestError::Store(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal error".into(),
            ),
            ApiError::Request(
                RequestError::Exchange(_)
                | RequestError::Upstream { .. }
                | RequestError::Http(_)
                | RequestError::Malformed(_),
            ) => (
                StatusCode::BAD_GATEWAY,
                "upstream_error",
                "Upstream request failed".into(),
            ),
        };

        warn!(error = %self, status = status.as_u16(), "request failed");
        let body = serde_json::json!({
            "error": { "type": kind, "message": message }
        });
        (status, Json(body)).into_response()
    }
}
