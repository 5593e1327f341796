//! The 4xx/5xx taxonomy of spec.md §7, as a typed error the `axum` handlers
//! return directly rather than building responses by hand.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Bad method, missing/malformed query, wrong content type, empty or
    /// unparseable body: protocol errors, surfaced as 4xx, never recorded.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// `RC` not present in the store.
    #[error("unknown request context")]
    NotFound,
    /// A debug-mode dependency call had no matching recorded
    /// `dependency-response` (spec.md §7's "signal that replay has diverged
    /// from the recorded execution").
    #[error("no matching recorded dependency response")]
    DependencyMiss,
    /// Unmarshalling, lookup inconsistencies, proxy dispatch failures: log,
    /// surface as 500, do not leak detail to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            GatewayError::BadRequest(msg) => {
                tracing::event!(tracing::Level::DEBUG, %msg, "bad request");
                StatusCode::BAD_REQUEST.into_response()
            }
            GatewayError::NotFound => StatusCode::NOT_FOUND.into_response(),
            GatewayError::DependencyMiss => {
                tracing::event!(tracing::Level::WARN, "debug-mode dependency miss");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            GatewayError::Internal(err) => {
                tracing::event!(tracing::Level::ERROR, %err, "internal error");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
