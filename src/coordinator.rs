//! The shared request service.
//!
//! A `RequestCoordinator` owns the response cache and the API client (with
//! its in-flight registry). Every list controller receives a clone, and
//! clones share both, so two views rendering the same list share one cache
//! entry and one network round-trip. Tests build a fresh coordinator per case.
//!
//! Invalidating a scope also detaches its in-flight GETs and bumps the
//! scope's generation, so a page requested before a mutation is neither
//! joined by the refetch nor written back into the cache.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use crate::api::{ApiClient, ApiError, Method, PaginationMeta, Params, RawPage};
use crate::cache::{CacheKey, CacheResult, ResponseCache, Ttl};
use crate::config::Config;
use crate::lock;

#[derive(Clone)]
pub struct RequestCoordinator {
  client: ApiClient,
  cache: ResponseCache,
  generations: Arc<Mutex<HashMap<String, u64>>>,
}

impl RequestCoordinator {
  pub fn new(client: ApiClient) -> Self {
    Self::with_cache(client, ResponseCache::new())
  }

  pub fn with_cache(client: ApiClient, cache: ResponseCache) -> Self {
    Self {
      client,
      cache,
      generations: Arc::default(),
    }
  }

  pub fn from_config(config: &Config) -> color_eyre::Result<Self> {
    Ok(Self::new(ApiClient::from_config(config)?))
  }

  pub fn client(&self) -> &ApiClient {
    &self.client
  }

  pub fn cache(&self) -> &ResponseCache {
    &self.cache
  }

  /// Unexpired cached page for `scope` and `params`, if any.
  pub fn cached_list(&self, scope: &str, params: &Params) -> Option<CacheResult<RawPage>> {
    let key = CacheKey::for_params(scope, params);
    let entry = self.cache.get(key.as_str())?;

    let data = match entry.data {
      Value::Array(items) => items,
      _ => return None,
    };
    debug!(key = %entry.description, "List cache hit");

    Some(CacheResult::from_cache(
      RawPage {
        data,
        meta: entry.meta.unwrap_or_default(),
      },
      entry.cached_at,
    ))
  }

  /// Load a page from the network, storing it for `ttl` when given.
  pub async fn load_list(
    &self,
    scope: &str,
    params: &Params,
    ttl: Option<Duration>,
  ) -> Result<RawPage, ApiError> {
    let generation = self.generation(scope);
    let body: Value = self.client.get_json(scope, params.clone()).await?;
    let page = into_raw_page(body).ok_or_else(|| ApiError::decode(Method::Get, scope))?;

    if ttl.is_some() && self.generation(scope) != generation {
      debug!(scope, "Scope invalidated while loading, not caching page");
    } else if let Some(ttl) = ttl {
      let key = CacheKey::for_params(scope, params);
      self.cache.set(
        &key,
        Value::Array(page.data.clone()),
        Some(page.meta.clone()),
        ttl,
      );
    }

    Ok(page)
  }

  /// Cache-first list fetch.
  pub async fn fetch_list(
    &self,
    scope: &str,
    params: &Params,
    ttl: Duration,
  ) -> Result<CacheResult<RawPage>, ApiError> {
    if let Some(cached) = self.cached_list(scope, params) {
      return Ok(cached);
    }
    let page = self.load_list(scope, params, Some(ttl)).await?;
    Ok(CacheResult::from_network(page))
  }

  /// Cache-first GET for a non-list body.
  pub async fn fetch_cached(
    &self,
    path: &str,
    params: &Params,
    ttl: Duration,
  ) -> Result<CacheResult<Value>, ApiError> {
    let key = CacheKey::for_params(path, params);
    if let Some(entry) = self.cache.get(key.as_str()) {
      debug!(key = %entry.description, "Cache hit");
      return Ok(CacheResult::from_cache(entry.data, entry.cached_at));
    }

    let body: Value = self.client.get_json(path, params.clone()).await?;
    self.cache.set(&key, body.clone(), None, ttl);
    Ok(CacheResult::from_network(body))
  }

  /// Site-wide settings, cached as reference data.
  pub async fn settings(&self) -> Result<CacheResult<Value>, ApiError> {
    self
      .fetch_cached("/api/admin/settings", &Params::new(), Ttl::REFERENCE)
      .await
  }

  /// An enumeration table such as order statuses, cached as lookup data.
  pub async fn lookup_table(&self, name: &str) -> Result<CacheResult<Value>, ApiError> {
    let path = format!("/api/admin/enums/{}", name);
    self.fetch_cached(&path, &Params::new(), Ttl::LOOKUP).await
  }

  /// Drop every cached response of one endpoint and detach its in-flight
  /// list requests. Returns the number of cache entries removed.
  pub fn invalidate(&self, scope: &str) -> usize {
    *lock(&self.generations).entry(scope.to_string()).or_default() += 1;
    let detached = self.client.detach_in_flight(scope);
    let removed = self.cache.invalidate_scope(scope);
    debug!(scope, removed, detached, "Invalidated cache scope");
    removed
  }

  fn generation(&self, scope: &str) -> u64 {
    lock(&self.generations).get(scope).copied().unwrap_or_default()
  }

  /// Drop all cached responses; in-flight requests are unaffected.
  pub fn clear_cache(&self) {
    self.cache.clear(None);
  }
}

/// Accept `{data, meta}` bodies and bare arrays from unpaginated endpoints.
fn into_raw_page(body: Value) -> Option<RawPage> {
  match body {
    Value::Array(data) => {
      let total = data.len() as u64;
      let mut meta = PaginationMeta::empty(data.len() as u32);
      meta.total = total;
      if total > 0 {
        meta.from = Some(1);
        meta.to = Some(total);
      }
      Some(RawPage { data, meta })
    }
    body @ Value::Object(_) => serde_json::from_value(body).ok(),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::testing::{list_body, reply, FakeTransport};
  use crate::api::{ApiErrorKind, ParamValue};
  use crate::cache::CacheSource;
  use serde_json::json;

  fn page_params(page: u32) -> Params {
    let mut params = Params::new();
    params.insert("page".into(), ParamValue::from(page));
    params
  }

  #[tokio::test(start_paused = true)]
  async fn test_fetch_list_is_cache_first() {
    let transport =
      FakeTransport::new(|_| Ok(reply(200, list_body(vec![json!({"id": 1})], 1, 10, 1))));
    let coordinator = RequestCoordinator::new(transport.client());

    let first = coordinator
      .fetch_list("/api/admin/users", &page_params(1), Ttl::LIST)
      .await
      .unwrap();
    let second = coordinator
      .fetch_list("/api/admin/users", &page_params(1), Ttl::LIST)
      .await
      .unwrap();

    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(second.data.data, vec![json!({"id": 1})]);
    assert_eq!(second.data.meta.total, 1);
    assert_eq!(transport.call_count(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_expired_list_goes_back_to_network() {
    let transport = FakeTransport::new(|_| Ok(reply(200, list_body(vec![], 1, 10, 0))));
    let coordinator = RequestCoordinator::new(transport.client());

    coordinator
      .fetch_list("/api/admin/users", &page_params(1), Duration::from_secs(30))
      .await
      .unwrap();
    tokio::time::advance(Duration::from_secs(31)).await;
    coordinator
      .fetch_list("/api/admin/users", &page_params(1), Duration::from_secs(30))
      .await
      .unwrap();

    assert_eq!(transport.call_count(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_load_list_without_ttl_does_not_cache() {
    let transport = FakeTransport::new(|_| Ok(reply(200, list_body(vec![], 1, 10, 0))));
    let coordinator = RequestCoordinator::new(transport.client());

    coordinator
      .load_list("/api/admin/users", &page_params(1), None)
      .await
      .unwrap();
    assert!(coordinator.cache().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_bare_array_body_is_a_single_page() {
    let transport =
      FakeTransport::new(|_| Ok(reply(200, json!([{"id": 1}, {"id": 2}, {"id": 3}]))));
    let coordinator = RequestCoordinator::new(transport.client());

    let page = coordinator
      .load_list("/api/admin/categories", &Params::new(), None)
      .await
      .unwrap();
    assert_eq!(page.data.len(), 3);
    assert_eq!(page.meta.total, 3);
    assert_eq!(page.meta.last_page, 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_scalar_body_is_decode_error() {
    let transport = FakeTransport::new(|_| Ok(reply(200, json!("nope"))));
    let coordinator = RequestCoordinator::new(transport.client());

    let err = coordinator
      .load_list("/api/admin/users", &Params::new(), None)
      .await
      .unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Decode);
  }

  #[tokio::test(start_paused = true)]
  async fn test_lookup_tables_are_cached_per_name() {
    let transport = FakeTransport::new(|req| {
      let name = req.url.path().rsplit('/').next().unwrap_or_default().to_string();
      Ok(reply(200, json!({ "name": name })))
    });
    let coordinator = RequestCoordinator::new(transport.client());

    let statuses = coordinator.lookup_table("order-statuses").await.unwrap();
    let again = coordinator.lookup_table("order-statuses").await.unwrap();
    let roles = coordinator.lookup_table("roles").await.unwrap();

    assert_eq!(statuses.data, json!({"name": "order-statuses"}));
    assert!(again.is_cached());
    assert_eq!(roles.data, json!({"name": "roles"}));
    assert_eq!(transport.call_count(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_settings_expire_after_reference_ttl() {
    let transport = FakeTransport::new(|_| Ok(reply(200, json!({"currency": "USD"}))));
    let coordinator = RequestCoordinator::new(transport.client());

    coordinator.settings().await.unwrap();
    tokio::time::advance(Ttl::REFERENCE - Duration::from_secs(1)).await;
    assert!(coordinator.settings().await.unwrap().is_cached());
    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(!coordinator.settings().await.unwrap().is_cached());
    assert_eq!(transport.call_count(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_clones_share_cache_and_requests() {
    let transport = FakeTransport::new(|_| Ok(reply(200, list_body(vec![], 1, 10, 0)).after_ms(20)));
    let coordinator = RequestCoordinator::new(transport.client());
    let other = coordinator.clone();

    let params = page_params(1);
    let (a, b) = tokio::join!(
      coordinator.fetch_list("/api/admin/orders", &params, Ttl::LIST),
      other.fetch_list("/api/admin/orders", &params, Ttl::LIST),
    );
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(transport.call_count(), 1);

    assert_eq!(other.invalidate("/api/admin/orders"), 1);
    assert!(coordinator.cache().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidation_during_load_skips_cache_write() {
    let transport = FakeTransport::new(|_| Ok(reply(200, list_body(vec![], 1, 10, 0)).after_ms(50)));
    let coordinator = RequestCoordinator::new(transport.client());

    let load = tokio::spawn({
      let coordinator = coordinator.clone();
      async move {
        coordinator
          .fetch_list("/api/admin/orders", &page_params(1), Ttl::LIST)
          .await
      }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    coordinator.invalidate("/api/admin/orders");

    assert!(load.await.unwrap().is_ok());
    assert!(coordinator.cache().is_empty());

    let again = coordinator
      .fetch_list("/api/admin/orders", &page_params(1), Ttl::LIST)
      .await
      .unwrap();
    assert_eq!(again.source, CacheSource::Network);
    assert_eq!(transport.call_count(), 2);
  }
}
