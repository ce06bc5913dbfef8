//! SSE streaming relay.
//!
//! Re-frames an upstream `text/event-stream` response for the caller:
//! each upstream `data:` payload becomes one `data: <payload>\n\n` frame,
//! forwarded in arrival order. The relay always terminates the client
//! stream with exactly one `data: [DONE]\n\n` sentinel, whether the
//! upstream exhausts normally, sends zero chunks, or fails mid-stream
//! (in which case a single in-band error frame precedes the sentinel).
//!
//! [`SseFramer`] reassembles complete lines across TCP chunk boundaries,
//! tolerates CRLF endings and `data:` without a space, and swallows the
//! upstream's own `[DONE]` line so the sentinel is never duplicated.

use std::convert::Infallible;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures::{Stream, StreamExt};

/// Terminal sentinel frame, emitted exactly once per streaming response.
pub const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// Cap on the line-reassembly buffer. A line that grows past this without a
/// newline is dropped rather than held indefinitely.
const MAX_BUFFER: usize = 64 * 1024;

/// Line-buffered extraction of `data:` payloads from an SSE byte stream.
pub(crate) struct SseFramer {
    buffer: Vec<u8>,
}

impl SseFramer {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed a chunk of bytes; returns the complete payloads it finished.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Ok(text) = std::str::from_utf8(&line) {
                if let Some(payload) = parse_data_line(text.trim_end_matches(['\n', '\r'])) {
                    payloads.push(payload.to_string());
                }
            }
        }

        if self.buffer.len() > MAX_BUFFER {
            tracing::warn!(
                buffered = self.buffer.len(),
                "dropping oversized SSE line without newline"
            );
            self.buffer.clear();
        }

        payloads
    }

    /// Flush any trailing content that never received a newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        std::str::from_utf8(&line)
            .ok()
            .and_then(|text| parse_data_line(text.trim_end_matches('\r')))
            .map(str::to_string)
    }
}

/// Extract the payload of a `data:` line.
///
/// Non-data SSE fields (`event:`, `id:`, `retry:`, comments), blank lines,
/// and the upstream's own `[DONE]` marker all yield `None`.
fn parse_data_line(line: &str) -> Option<&str> {
    let payload = line.strip_prefix("data:")?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    Some(payload)
}

/// Wrap a payload in an SSE data frame.
fn data_frame(payload: &str) -> Bytes {
    Bytes::from(format!("data: {payload}\n\n"))
}

/// Build an in-band error frame for a mid-stream upstream failure.
fn error_frame(message: &str) -> Bytes {
    let body = serde_json::json!({ "error": message });
    Bytes::from(format!("data: {body}\n\n"))
}

/// Relay an already-open upstream streaming response to the caller.
///
/// The sentinel yield sits after the forwarding loop on every exit path, so
/// it fires exactly once per request. If the caller disconnects, the body
/// stream is dropped, which drops the upstream response and aborts the
/// transfer.
pub fn relay_stream(upstream: reqwest::Response) -> Response {
    relay_chunks(upstream.bytes_stream())
}

/// Re-frame a raw SSE chunk stream into the response body.
///
/// Generic over the chunk source so the error path can be driven directly.
fn relay_chunks<S, E>(chunks: S) -> Response
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send,
{
    let stream = async_stream::stream! {
        futures::pin_mut!(chunks);
        let mut framer = SseFramer::new();

        loop {
            match chunks.next().await {
                Some(Ok(bytes)) => {
                    for payload in framer.push(&bytes) {
                        yield Ok::<Bytes, Infallible>(data_frame(&payload));
                    }
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "upstream stream failed mid-flight");
                    yield Ok(error_frame(&e.to_string()));
                    break;
                }
                None => {
                    if let Some(payload) = framer.finish() {
                        yield Ok(data_frame(&payload));
                    }
                    break;
                }
            }
        }

        yield Ok(Bytes::from_static(DONE_FRAME));
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(stream))
        .unwrap()
}
