//! keywheel - credential-rotating reverse proxy for OpenAI-compatible chat APIs
//!
//! This library provides the core functionality for the keywheel proxy:
//! the durable credential pool with round-robin selection, the per-credential
//! upstream client cache, and the HTTP relay (including SSE re-streaming).

pub mod config;
pub mod error;
pub mod pool;
pub mod proxy;

pub use config::Config;
pub use error::{Error, Result};
