//! Inbound request authentication.
//!
//! Every route except `/health` requires `Authorization: Bearer <secret>`
//! matching the configured shared secret exactly. The check runs as a
//! middleware layer before any handler logic.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::server::AppState;
use crate::error::Error;

/// Extract the Bearer token from the Authorization header.
fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

/// Middleware rejecting requests without the configured shared secret.
pub async fn require_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    match extract_bearer(request.headers()) {
        Some(provided) if provided == state.config.auth.secret.expose_secret() => {
            next.run(request).await
        }
        _ => Error::Unauthorized.into_response(),
    }
}
