//! In-memory response cache with lazily checked TTLs.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::api::PaginationMeta;
use crate::lock;

use super::key::CacheKey;

/// Standard time-to-live values
pub struct Ttl;

impl Ttl {
  /// Paginated list responses
  pub const LIST: Duration = Duration::from_secs(5 * 60);
  /// Rarely changing reference data such as site settings
  pub const REFERENCE: Duration = Duration::from_secs(10 * 60);
  /// Enumerations and lookup tables
  pub const LOOKUP: Duration = Duration::from_secs(24 * 60 * 60);
}

/// A cached response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
  pub key: String,
  /// Endpoint the entry was fetched from
  pub scope: String,
  /// Readable form of the key input, for logs
  pub description: String,
  /// List items as a JSON array, or the whole body for non-list responses
  pub data: Value,
  pub meta: Option<PaginationMeta>,
  /// Monotonic store time, used for expiry
  pub stored_at: Instant,
  /// Wall-clock store time, for display
  pub cached_at: DateTime<Utc>,
  pub ttl: Duration,
}

impl CacheEntry {
  fn is_expired_at(&self, now: Instant) -> bool {
    now.saturating_duration_since(self.stored_at) >= self.ttl
  }
}

/// Map from cache key to entry, shared between clones.
///
/// Entries are never swept; an expired entry is dropped when it is read.
#[derive(Clone, Default)]
pub struct ResponseCache {
  entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl ResponseCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fresh entry for `key`, evicting it if it has expired.
  pub fn get(&self, key: &str) -> Option<CacheEntry> {
    let mut entries = lock(&self.entries);
    let expired = entries.get(key)?.is_expired_at(Instant::now());

    if expired {
      if let Some(entry) = entries.remove(key) {
        debug!(key = %entry.description, "Evicted expired cache entry");
      }
      return None;
    }
    entries.get(key).cloned()
  }

  /// Store a response, replacing any previous entry for the key.
  pub fn set(&self, key: &CacheKey, data: Value, meta: Option<PaginationMeta>, ttl: Duration) {
    let entry = CacheEntry {
      key: key.as_str().to_string(),
      scope: key.scope().to_string(),
      description: key.description(),
      data,
      meta,
      stored_at: Instant::now(),
      cached_at: Utc::now(),
      ttl,
    };
    lock(&self.entries).insert(entry.key.clone(), entry);
  }

  /// Remove one entry, or everything when `key` is `None`.
  pub fn clear(&self, key: Option<&str>) {
    let mut entries = lock(&self.entries);
    match key {
      Some(key) => {
        entries.remove(key);
      }
      None => entries.clear(),
    }
  }

  /// Remove every entry fetched from `scope`; returns how many were removed.
  pub fn invalidate_scope(&self, scope: &str) -> usize {
    let mut entries = lock(&self.entries);
    let before = entries.len();
    entries.retain(|_, entry| entry.scope != scope);
    before - entries.len()
  }

  pub fn len(&self) -> usize {
    lock(&self.entries).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn key(scope: &str, page: u32) -> CacheKey {
    CacheKey::new(scope, &json!({ "page": page }))
  }

  #[tokio::test(start_paused = true)]
  async fn test_entry_expires_at_ttl() {
    let cache = ResponseCache::new();
    let k = key("/api/admin/users", 1);
    cache.set(&k, json!([1, 2]), None, Duration::from_secs(60));

    tokio::time::advance(Duration::from_secs(59)).await;
    assert_eq!(cache.get(k.as_str()).unwrap().data, json!([1, 2]));

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(cache.get(k.as_str()).is_none());
    // Evicted on read
    assert!(cache.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_set_overwrites_and_restarts_ttl() {
    let cache = ResponseCache::new();
    let k = key("/api/admin/users", 1);
    cache.set(&k, json!("old"), None, Duration::from_secs(10));
    tokio::time::advance(Duration::from_secs(8)).await;
    cache.set(&k, json!("new"), None, Duration::from_secs(10));
    tokio::time::advance(Duration::from_secs(8)).await;

    assert_eq!(cache.get(k.as_str()).unwrap().data, json!("new"));
    assert_eq!(cache.len(), 1);
  }

  #[test]
  fn test_clear_one_or_all() {
    let cache = ResponseCache::new();
    let a = key("/api/admin/users", 1);
    let b = key("/api/admin/users", 2);
    cache.set(&a, json!([]), None, Ttl::LIST);
    cache.set(&b, json!([]), None, Ttl::LIST);

    cache.clear(Some(a.as_str()));
    assert!(cache.get(a.as_str()).is_none());
    assert!(cache.get(b.as_str()).is_some());

    cache.clear(None);
    assert!(cache.is_empty());
  }

  #[test]
  fn test_invalidate_scope_keeps_other_endpoints() {
    let cache = ResponseCache::new();
    cache.set(&key("/api/admin/users", 1), json!([]), None, Ttl::LIST);
    cache.set(&key("/api/admin/users", 2), json!([]), None, Ttl::LIST);
    let posts = key("/api/admin/posts", 1);
    cache.set(&posts, json!([]), None, Ttl::LIST);

    assert_eq!(cache.invalidate_scope("/api/admin/users"), 2);
    assert_eq!(cache.len(), 1);
    assert!(cache.get(posts.as_str()).is_some());
  }

  #[test]
  fn test_clones_share_entries() {
    let cache = ResponseCache::new();
    let other = cache.clone();
    let k = key("/api/admin/settings", 0);
    cache.set(&k, json!({"site": "shop"}), None, Ttl::REFERENCE);
    assert!(other.get(k.as_str()).is_some());
  }
}
