use std::time::Duration;

use super::state::{FilterState, FilterValue, ListQuery, PaginationState, SortState};
use crate::cache::Ttl;
use crate::config::ListsConfig;

/// Configuration of one list view.
#[derive(Debug, Clone)]
pub struct ListOptions {
  /// API path the list is fetched from; also the cache scope
  pub endpoint: String,
  /// Filters this view accepts; empty accepts any key
  pub filter_keys: Vec<String>,
  pub default_filters: FilterState,
  pub default_sort: SortState,
  pub per_page: u32,
  pub debounce: Duration,
  /// `None` bypasses the response cache
  pub cache_ttl: Option<Duration>,
  pub reset_page_on_filter: bool,
  pub reset_on_route_change: bool,
  /// Extra attempts for retryable failures
  pub retries: u32,
  pub retry_backoff: Duration,
}

impl ListOptions {
  pub fn new(endpoint: impl Into<String>) -> Self {
    Self {
      endpoint: endpoint.into(),
      filter_keys: Vec::new(),
      default_filters: FilterState::new(),
      default_sort: SortState::default(),
      per_page: 10,
      debounce: Duration::from_millis(300),
      cache_ttl: Some(Ttl::LIST),
      reset_page_on_filter: true,
      reset_on_route_change: true,
      retries: 0,
      retry_backoff: Duration::from_millis(500),
    }
  }

  /// Options seeded from the `lists` section of the config file.
  pub fn from_config(endpoint: impl Into<String>, config: &ListsConfig) -> Self {
    let cache_ttl = match config.cache_ttl_secs {
      0 => None,
      secs => Some(Duration::from_secs(secs)),
    };
    Self {
      per_page: config.per_page.max(1),
      debounce: Duration::from_millis(config.debounce_ms),
      cache_ttl,
      retries: config.retries,
      ..Self::new(endpoint)
    }
  }

  pub fn filter_keys<I, S>(mut self, keys: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.filter_keys = keys.into_iter().map(Into::into).collect();
    self
  }

  pub fn default_filter(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
    self.default_filters.set(key, value);
    self
  }

  pub fn default_sort(mut self, sort: SortState) -> Self {
    self.default_sort = sort;
    self
  }

  pub fn per_page(mut self, per_page: u32) -> Self {
    self.per_page = per_page.max(1);
    self
  }

  pub fn debounce(mut self, debounce: Duration) -> Self {
    self.debounce = debounce;
    self
  }

  pub fn cache_ttl(mut self, ttl: Option<Duration>) -> Self {
    self.cache_ttl = ttl;
    self
  }

  pub fn reset_page_on_filter(mut self, reset: bool) -> Self {
    self.reset_page_on_filter = reset;
    self
  }

  pub fn reset_on_route_change(mut self, reset: bool) -> Self {
    self.reset_on_route_change = reset;
    self
  }

  pub fn retries(mut self, retries: u32, backoff: Duration) -> Self {
    self.retries = retries;
    self.retry_backoff = backoff;
    self
  }

  /// Whether `key` may be used as a filter.
  pub fn accepts_filter(&self, key: &str) -> bool {
    self.filter_keys.is_empty() || self.filter_keys.iter().any(|k| k == key)
  }

  /// The state a fresh view starts from.
  pub fn defaults(&self) -> ListQuery {
    ListQuery {
      filters: self.default_filters.clone(),
      sort: self.default_sort.clone(),
      page: PaginationState::new(self.per_page),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_config() {
    let config = ListsConfig {
      per_page: 25,
      debounce_ms: 150,
      cache_ttl_secs: 0,
      retries: 2,
    };
    let options = ListOptions::from_config("/api/admin/orders", &config);
    assert_eq!(options.per_page, 25);
    assert_eq!(options.debounce, Duration::from_millis(150));
    assert_eq!(options.cache_ttl, None);
    assert_eq!(options.retries, 2);
    assert!(options.reset_page_on_filter);
  }

  #[test]
  fn test_filter_whitelist() {
    let open = ListOptions::new("/api/admin/users");
    assert!(open.accepts_filter("anything"));

    let strict = open.filter_keys(["search", "role"]);
    assert!(strict.accepts_filter("role"));
    assert!(!strict.accepts_filter("status"));
  }

  #[test]
  fn test_defaults() {
    let options = ListOptions::new("/api/admin/posts")
      .default_filter("status", "published")
      .per_page(20);
    let defaults = options.defaults();
    assert_eq!(defaults.page.per_page, 20);
    assert_eq!(defaults.page.current_page, 1);
    assert_eq!(
      defaults.filters.get("status"),
      Some(&FilterValue::from("published"))
    );
  }
}
