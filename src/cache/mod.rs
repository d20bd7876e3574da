//! Short-lived response caching.
//!
//! This module provides:
//! - Deterministic cache keys from an endpoint and its request parameters
//! - An in-memory cache with per-entry TTL and lazy eviction on read
//! - Scope invalidation so mutations can drop every page of one list

mod key;
mod storage;
mod traits;

pub use key::{generate_cache_key, CacheKey};
pub use storage::{CacheEntry, ResponseCache, Ttl};
pub use traits::{CacheResult, CacheSource};
