//! Upstream client cache.
//!
//! One `reqwest::Client` per distinct (token, checksum) pair, so connection
//! pools are reused across requests dispatched with the same credential.
//! Clients are created lazily on first use and never evicted; if the
//! upstream address changes, the process restarts.

use std::time::Duration;

use dashmap::DashMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Client;

use crate::error::Error;

/// Outbound header carrying the credential's checksum.
pub const CHECKSUM_HEADER: &str = "x-cursor-checksum";

/// Concurrent cache of upstream clients keyed by credential pair.
pub struct ClientCache {
    base_url: String,
    connect_timeout: Duration,
    request_timeout: Duration,
    clients: DashMap<(String, String), Client>,
}

impl ClientCache {
    /// Create an empty cache for the given upstream.
    ///
    /// The base URL is normalized to always end with the `/v1` path segment.
    pub fn new(base_url: &str, connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            connect_timeout,
            request_timeout,
            clients: DashMap::new(),
        }
    }

    /// Normalized upstream base URL (ends with `/v1`).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the client for a credential pair, building it on first use.
    ///
    /// The dashmap entry API serializes first use per key, so at most one
    /// client is ever built and stored for a given pair even under
    /// concurrent misses.
    pub fn get_or_create(&self, token: &str, checksum: &str) -> Result<Client, Error> {
        let key = (token.to_string(), checksum.to_string());
        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }

        let client = self
            .clients
            .entry(key)
            .or_try_insert_with(|| self.build_client(token, checksum))?
            .clone();
        Ok(client)
    }

    fn build_client(&self, token: &str, checksum: &str) -> Result<Client, Error> {
        let mut headers = HeaderMap::new();

        let mut bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| Error::Upstream(format!("token is not usable as a header value: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let checksum_value = HeaderValue::from_str(checksum).map_err(|e| {
            Error::Upstream(format!("checksum is not usable as a header value: {e}"))
        })?;
        headers.insert(HeaderName::from_static(CHECKSUM_HEADER), checksum_value);

        Client::builder()
            .default_headers(headers)
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| Error::Upstream(format!("failed to build upstream client: {e}")))
    }

    /// Number of cached clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether any client has been created yet.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Ensure a base URL ends with the `/v1` API version segment.
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    }
}
