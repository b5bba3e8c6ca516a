//! Error kinds for the request path, mapped onto HTTP status codes.
//!
//! Startup failures (config parse, bind) go through `anyhow` in main;
//! everything here is returned on the wire.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum MockError {
    /// Path pattern is empty, does not start with `/`, or has a non-terminal `**`.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    /// Management API rejects non-JSON bodies on POST/PUT.
    #[error("unsupported media type {0:?}")]
    UnsupportedMediaType(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// POST body parsed cleanly but no ID could be derived from it.
    #[error("no id derivable from request")]
    NoIdFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("internal error: {0}")]
    Internal(String),
}

impl MockError {
    pub fn status(&self) -> StatusCode {
        match self {
            MockError::InvalidPattern { .. } => StatusCode::BAD_REQUEST,
            MockError::NotFound => StatusCode::NOT_FOUND,
            MockError::Conflict(_) => StatusCode::CONFLICT,
            MockError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            MockError::BadRequest(_) => StatusCode::BAD_REQUEST,
            MockError::NoIdFound => StatusCode::BAD_REQUEST,
            MockError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            MockError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MockError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
