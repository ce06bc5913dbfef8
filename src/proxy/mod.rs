//! HTTP proxy server module.
//!
//! This module provides the inbound HTTP API that accepts chat-completion
//! and pool-administration requests, and the relay that forwards them to
//! the upstream using a rotating credential.

mod auth;
mod client;
mod handlers;
pub mod relay;
mod server;
pub mod types;

pub use client::{ClientCache, CHECKSUM_HEADER};
pub use server::{create_router, run_server, AppState};
