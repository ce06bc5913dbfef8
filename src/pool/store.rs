//! Durable credential pool with round-robin selection.
//!
//! The pool is an ordered token → checksum mapping persisted as a JSON object.
//! All writes use atomic temp-file + rename to prevent corruption on crash.
//! A single tokio Mutex guards the entries, the rotation cursor, and the
//! persistence I/O, so selection is never stale relative to a concurrent
//! mutation and a mutation is never lost to a concurrent write.
//!
//! Persistence-failure reconciliation: a mutating operation applies its
//! change in memory, attempts the write while still holding the lock, and
//! rolls the change back if the write fails. In-memory and durable state
//! therefore never diverge past the operation boundary.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::checksum::generate_checksum;

/// Errors surfaced by pool persistence.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("failed to persist pool to '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize pool: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Entries plus rotation cursor, guarded together by one lock.
#[derive(Default)]
struct PoolState {
    entries: Vec<(String, String)>,
    cursor: usize,
}

/// Thread-safe credential pool backed by a JSON file.
pub struct TokenPool {
    path: PathBuf,
    state: Mutex<PoolState>,
}

impl TokenPool {
    /// Load the pool from the given file path.
    ///
    /// A missing, unreadable, or corrupt file yields an empty pool with a
    /// warning; loading never fails. File order defines rotation order.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&contents)
                {
                    Ok(map) => {
                        let entries: Vec<(String, String)> = map
                            .into_iter()
                            .filter_map(|(token, value)| {
                                value.as_str().map(|checksum| (token, checksum.to_string()))
                            })
                            .collect();
                        info!(path = %path.display(), tokens = entries.len(), "loaded pool");
                        entries
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "pool file is not a valid JSON object, starting with empty pool");
                        Vec::new()
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "pool file not found, starting with empty pool");
                Vec::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read pool file, starting with empty pool");
                Vec::new()
            }
        };

        Self {
            path,
            state: Mutex::new(PoolState {
                entries,
                cursor: 0,
            }),
        }
    }

    /// Add a token with a freshly generated checksum and persist.
    ///
    /// Returns `Ok(false)` without touching state if the token is already
    /// present. On a persistence failure the insertion is rolled back.
    pub async fn add(&self, token: &str) -> Result<bool, PoolError> {
        let mut state = self.state.lock().await;
        if state.entries.iter().any(|(t, _)| t == token) {
            return Ok(false);
        }

        state.entries.push((token.to_string(), generate_checksum()));
        if let Err(e) = persist(&self.path, &state.entries).await {
            state.entries.pop();
            return Err(e);
        }
        debug!(tokens = state.entries.len(), "token added to pool");
        Ok(true)
    }

    /// Remove a token and persist.
    ///
    /// Returns `Ok(false)` without touching state if the token is absent.
    /// On a persistence failure the removal is rolled back.
    pub async fn remove(&self, token: &str) -> Result<bool, PoolError> {
        let mut state = self.state.lock().await;
        let Some(index) = state.entries.iter().position(|(t, _)| t == token) else {
            return Ok(false);
        };

        let removed = state.entries.remove(index);
        if let Err(e) = persist(&self.path, &state.entries).await {
            state.entries.insert(index, removed);
            return Err(e);
        }

        // Keep the cursor pointing at the same logical position; next() takes
        // it modulo the new length, so it can never go out of range regardless.
        if index < state.cursor {
            state.cursor -= 1;
        }
        debug!(tokens = state.entries.len(), "token removed from pool");
        Ok(true)
    }

    /// Remove every token and persist the empty pool.
    ///
    /// On a persistence failure the previous entries are restored.
    pub async fn clear(&self) -> Result<(), PoolError> {
        let mut state = self.state.lock().await;
        let previous = std::mem::take(&mut state.entries);
        let previous_cursor = state.cursor;
        state.cursor = 0;

        if let Err(e) = persist(&self.path, &state.entries).await {
            state.entries = previous;
            state.cursor = previous_cursor;
            return Err(e);
        }
        info!("pool emptied");
        Ok(())
    }

    /// Snapshot of all (token, checksum) pairs in rotation order.
    pub async fn entries(&self) -> Vec<(String, String)> {
        let state = self.state.lock().await;
        state.entries.clone()
    }

    /// Number of stored credentials.
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.entries.len()
    }

    /// Whether the pool is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Select the next (token, checksum) pair round-robin.
    ///
    /// Returns `None` on an empty pool. The cursor read, the entry read, and
    /// the cursor advance all happen under the pool lock, so a concurrent
    /// deletion can never hand out a stale index.
    pub async fn next(&self) -> Option<(String, String)> {
        let mut state = self.state.lock().await;
        let n = state.entries.len();
        if n == 0 {
            return None;
        }
        let index = state.cursor % n;
        state.cursor = (index + 1) % n;
        Some(state.entries[index].clone())
    }
}

/// Write the pool to a file atomically as a JSON object in entry order.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. The parent directory is created if missing. Permissions are
/// set to 0600 since the file contains credentials.
async fn persist(path: &Path, entries: &[(String, String)]) -> Result<(), PoolError> {
    let mut map = serde_json::Map::with_capacity(entries.len());
    for (token, checksum) in entries {
        map.insert(token.clone(), serde_json::Value::String(checksum.clone()));
    }
    let json = serde_json::to_string_pretty(&map)?;

    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let io_err = |source: std::io::Error| PoolError::Io {
        path: path.display().to_string(),
        source,
    };

    tokio::fs::create_dir_all(&dir).await.map_err(io_err)?;

    let tmp_path = dir.join(format!(".pool.tmp.{}", std::process::id()));
    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(io_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(io_err)?;
    }

    tokio::fs::rename(&tmp_path, path).await.map_err(io_err)?;

    debug!(path = %path.display(), "persisted pool");
    Ok(())
}
