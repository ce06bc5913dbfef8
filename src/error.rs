//! Error types for keywheel.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Result type alias for keywheel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for keywheel.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No available tokens")]
    NoTokens,

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Pool error: {0}")]
    Pool(#[from] crate::pool::PoolError),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Error::NoTokens => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            Error::Upstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            Error::Pool(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = serde_json::json!({
            "error": {
                "message": message,
                "type": "keywheel_error",
                "code": status.as_u16()
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
