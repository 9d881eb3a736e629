//! Gateway Sync Core
//!
//! This crate provides the transactional cache that mirrors the gateway's
//! routes, upstreams and certificates, and guards upstream deletion against
//! routes that still reference the upstream.

pub mod cache;
pub mod error;

pub use cache::{Cache, CacheConfig, CacheStats, DbCache, ReferenceGuard};
pub use error::CoreError;
