//! Credential pool module.
//!
//! This module provides durable token → checksum storage with
//! round-robin selection over the stored credentials.

mod checksum;
mod store;

pub use checksum::{generate_checksum, CHECKSUM_PREFIX};
pub use store::{PoolError, TokenPool};
