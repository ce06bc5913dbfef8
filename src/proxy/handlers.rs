//! HTTP request handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::time::Duration;

use super::relay;
use super::server::AppState;
use super::types::ChatCompletionRequest;
use crate::error::Error;

/// Handle POST /v1/chat/completions
///
/// Resolves the next credential pair, obtains its cached upstream client,
/// then either relays the SSE stream or performs a bounded synchronous call.
pub async fn chat_completions(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, Error> {
    let request: ChatCompletionRequest = serde_json::from_slice(&body)
        .map_err(|_| Error::BadRequest("invalid JSON body".to_string()))?;
    if request.is_empty() {
        return Err(Error::BadRequest("request body must not be empty".to_string()));
    }

    let (token, checksum) = state.pool.next().await.ok_or(Error::NoTokens)?;
    let client = state.clients.get_or_create(&token, &checksum)?;
    let url = format!("{}/chat/completions", state.clients.base_url());

    tracing::info!(
        stream = request.is_streaming(),
        "dispatching chat completion"
    );

    if request.is_streaming() {
        let upstream = open_upstream(&client, &url, &request).await?;
        Ok(relay::relay_stream(upstream))
    } else {
        complete(&state, &client, &url, &request).await
    }
}

/// Open the upstream call, turning connect failures and non-2xx statuses
/// into errors before any bytes reach the caller.
async fn open_upstream(
    client: &reqwest::Client,
    url: &str,
    request: &ChatCompletionRequest,
) -> Result<reqwest::Response, Error> {
    let response = client
        .post(url)
        .json(request)
        .send()
        .await
        .map_err(|e| Error::Upstream(format!("failed to reach upstream: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, body = %body, "upstream returned error");
        return Err(Error::Upstream(format!(
            "upstream returned {status}: {body}"
        )));
    }

    Ok(response)
}

/// Non-streaming path: bounded-duration call, response body passed through.
async fn complete(
    state: &AppState,
    client: &reqwest::Client,
    url: &str,
    request: &ChatCompletionRequest,
) -> Result<Response, Error> {
    let deadline = Duration::from_secs(state.config.upstream.completion_timeout_secs);

    let result = tokio::time::timeout(deadline, async {
        let response = open_upstream(client, url, request).await?;
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| Error::Upstream(format!("failed to parse upstream response: {e}")))
    })
    .await;

    let payload = result.map_err(|_| {
        Error::Upstream(format!(
            "upstream request timed out after {}s",
            deadline.as_secs()
        ))
    })??;

    Ok(Json(payload).into_response())
}

#[derive(Deserialize)]
struct TokenBody {
    token: Option<String>,
}

/// Parse a pool-operation body and extract the required token field.
fn parse_token(body: &[u8]) -> Result<String, Error> {
    let parsed: TokenBody = serde_json::from_slice(body)
        .map_err(|_| Error::BadRequest("invalid JSON body".to_string()))?;
    match parsed.token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(Error::BadRequest("token is required".to_string())),
    }
}

/// Handle POST /pool/add
pub async fn pool_add(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, Error> {
    let token = parse_token(&body)?;
    if state.pool.add(&token).await? {
        Ok(Json(serde_json::json!({
            "message": "Token added successfully"
        })))
    } else {
        Err(Error::BadRequest("token already exists".to_string()))
    }
}

/// Handle POST /pool/del
pub async fn pool_del(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, Error> {
    let token = parse_token(&body)?;
    if state.pool.remove(&token).await? {
        Ok(Json(serde_json::json!({
            "message": "Token deleted successfully"
        })))
    } else {
        Err(Error::NotFound("token not found".to_string()))
    }
}

/// Handle GET /pool/disp - full token → checksum mapping in rotation order
pub async fn pool_disp(State(state): State<AppState>) -> Json<serde_json::Value> {
    let entries = state.pool.entries().await;
    let mut map = serde_json::Map::with_capacity(entries.len());
    for (token, checksum) in entries {
        map.insert(token, serde_json::Value::String(checksum));
    }
    Json(serde_json::Value::Object(map))
}

/// Handle POST /pool/empty
pub async fn pool_empty(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, Error> {
    state.pool.clear().await?;
    Ok(Json(serde_json::json!({
        "message": "Pool emptied successfully"
    })))
}

/// Handle GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_present() {
        let token = parse_token(br#"{"token": "tok-1"}"#).unwrap();
        assert_eq!(token, "tok-1");
    }

    #[test]
    fn test_parse_token_missing() {
        let result = parse_token(br#"{}"#);
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_parse_token_empty() {
        let result = parse_token(br#"{"token": ""}"#);
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_parse_token_invalid_json() {
        let result = parse_token(b"{nope");
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }
}
