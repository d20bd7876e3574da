//! The list state controller.
//!
//! Every change to filters, sort or pagination goes through one pipeline:
//! diff against the current query, commit, mirror into the URL, then fetch.
//! Filter changes fetch through the debouncer; page, sort and size changes
//! fetch at once. Fetch results carry a sequence number and only the newest
//! one ever lands in the view state.

use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::hooks::{IdentityHooks, ListHooks};
use super::options::ListOptions;
use super::state::{
  FilterState, FilterValue, ListPage, ListQuery, ListViewState, PaginationState, QueryKeys,
  SortState,
};
use crate::api::{ApiError, Method, PaginationMeta, Params, RawPage};
use crate::cache::CacheSource;
use crate::coordinator::RequestCoordinator;
use crate::debounce::Debounced;
use crate::lock;
use crate::url_state::{RouteChange, Router, UrlStateMirror};

/// Item types a list can hold
pub trait ListItem: DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> ListItem for T where T: DeserializeOwned + Clone + Send + Sync + 'static {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
  CacheFirst,
  NetworkOnly,
}

struct ControllerState<T> {
  view: ListViewState<T>,
  /// Sequence number of the last result written to `view`
  committed_seq: u64,
  /// Network fetches that have not settled yet
  active_fetches: usize,
  last_error: Option<ApiError>,
  /// Path of the route last seen by `handle_route_change`
  route_path: Option<String>,
}

struct ControllerInner<T> {
  coordinator: RequestCoordinator,
  options: ListOptions,
  mirror: UrlStateMirror,
  router: Option<Arc<dyn Router>>,
  hooks: Arc<dyn ListHooks<T>>,
  /// Path the view lives on; `None` without a router
  home_path: Option<String>,
  state: Mutex<ControllerState<T>>,
  next_seq: AtomicU64,
}

impl<T: ListItem> ControllerInner<T> {
  async fn fetch(&self, extra: Option<Params>, mode: FetchMode) -> Result<ListPage<T>, ApiError> {
    let mut params = lock(&self.state).view.query().to_params(&QueryKeys::DEFAULT);
    if let Some(extra) = extra {
      params.extend(extra);
    }
    params.retain(|_, value| !value.is_blank());

    let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
    let endpoint = self.options.endpoint.as_str();

    if mode == FetchMode::CacheFirst && self.options.cache_ttl.is_some() {
      if let Some(cached) = self.coordinator.cached_list(endpoint, &params) {
        let result = self.decode(cached.data, CacheSource::Cache);
        self.settle(seq, &result, false);
        return result;
      }
    }

    {
      let mut state = lock(&self.state);
      state.active_fetches += 1;
      state.view.loading = true;
      state.view.error = None;
    }

    let result = self
      .load_with_retry(&params)
      .await
      .and_then(|raw| self.decode(raw, CacheSource::Network));

    if let Err(err) = &result {
      warn!(endpoint, seq, "List fetch failed: {}", err);
    }
    self.settle(seq, &result, true);
    result
  }

  async fn load_with_retry(&self, params: &Params) -> Result<RawPage, ApiError> {
    let endpoint = self.options.endpoint.as_str();
    let mut attempt = 0;
    loop {
      match self
        .coordinator
        .load_list(endpoint, params, self.options.cache_ttl)
        .await
      {
        Err(err) if err.is_retryable() && attempt < self.options.retries => {
          let delay = self.options.retry_backoff * 2u32.saturating_pow(attempt);
          attempt += 1;
          warn!(endpoint, attempt, "Retrying list fetch in {:?}: {}", delay, err);
          tokio::time::sleep(delay).await;
        }
        result => return result,
      }
    }
  }

  fn decode(&self, raw: RawPage, source: CacheSource) -> Result<ListPage<T>, ApiError> {
    let items = raw
      .data
      .into_iter()
      .map(|item| serde_json::from_value::<T>(item).map(|item| self.hooks.transform_item(item)))
      .collect::<Result<Vec<_>, _>>()
      .map_err(|err| {
        warn!(endpoint = %self.options.endpoint, "Undecodable list item: {}", err);
        ApiError::decode(Method::Get, self.options.endpoint.as_str())
      })?;

    Ok(ListPage {
      items,
      meta: raw.meta,
      source,
    })
  }

  /// Commit a finished fetch unless a newer one already has been.
  fn settle(&self, seq: u64, result: &Result<ListPage<T>, ApiError>, counted: bool) {
    let committed = {
      let mut state = lock(&self.state);
      if counted {
        state.active_fetches = state.active_fetches.saturating_sub(1);
        state.view.loading = state.active_fetches > 0;
      }

      if seq <= state.committed_seq {
        debug!(
          seq,
          committed = state.committed_seq,
          "Discarding stale list response"
        );
        return;
      }
      state.committed_seq = seq;

      match result {
        Ok(page) => {
          state.view.items = page.items.clone();
          state.view.pagination = page.meta.clone();
          state.view.error = None;
          state.last_error = None;
          true
        }
        Err(err) => {
          state.view.error = Some(err.message.clone());
          state.last_error = Some(err.clone());
          false
        }
      }
    };

    if let (true, Ok(page)) = (committed, result) {
      self.hooks.after_fetch(&page.items, &page.meta);
    }
  }

  /// Commit `next` if it differs from the current query. Returns whether
  /// anything changed.
  fn commit(&self, next: &ListQuery) -> bool {
    let mut state = lock(&self.state);
    if state.view.query() == *next {
      return false;
    }
    state.view.set_query(next.clone());
    true
  }
}

/// State controller for one list view.
///
/// Clones share state, so a clone can be handed to a route watcher or a CRUD
/// extension.
pub struct ListController<T> {
  inner: Arc<ControllerInner<T>>,
  debounced: Debounced<Option<Params>, ()>,
}

impl<T> Clone for ListController<T> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
      debounced: self.debounced.clone(),
    }
  }
}

pub struct ListControllerBuilder<T> {
  coordinator: RequestCoordinator,
  options: ListOptions,
  router: Option<Arc<dyn Router>>,
  hooks: Arc<dyn ListHooks<T>>,
}

impl<T: ListItem> ListControllerBuilder<T> {
  /// Mirror state into `router` and start from its current location.
  pub fn router(mut self, router: Arc<dyn Router>) -> Self {
    self.router = Some(router);
    self
  }

  pub fn hooks(mut self, hooks: Arc<dyn ListHooks<T>>) -> Self {
    self.hooks = hooks;
    self
  }

  pub fn build(self) -> ListController<T> {
    let defaults = self.options.defaults();
    let mirror = UrlStateMirror::new(self.options.filter_keys.clone(), defaults.clone());
    let wait = self.options.debounce;

    let (initial, home_path) = match &self.router {
      Some(router) => {
        let location = router.location();
        (mirror.load(&location), Some(location.path))
      }
      None => (defaults, None),
    };

    let inner = Arc::new(ControllerInner {
      coordinator: self.coordinator,
      options: self.options,
      mirror,
      router: self.router,
      hooks: self.hooks,
      state: Mutex::new(ControllerState {
        view: ListViewState::new(initial),
        committed_seq: 0,
        active_fetches: 0,
        last_error: None,
        route_path: home_path.clone(),
      }),
      home_path,
      next_seq: AtomicU64::new(0),
    });

    let debounced = {
      let inner = Arc::clone(&inner);
      Debounced::new(
        move |extra: Option<Params>| {
          let inner = Arc::clone(&inner);
          tokio::spawn(async move {
            // Failures are recorded in the view state
            let _ = inner.fetch(extra, FetchMode::CacheFirst).await;
          });
        },
        wait,
      )
    };

    ListController { inner, debounced }
  }
}

impl<T: ListItem> ListController<T> {
  pub fn new(coordinator: RequestCoordinator, options: ListOptions) -> Self {
    Self::builder(coordinator, options).build()
  }

  pub fn builder(coordinator: RequestCoordinator, options: ListOptions) -> ListControllerBuilder<T> {
    ListControllerBuilder {
      coordinator,
      options,
      router: None,
      hooks: Arc::new(IdentityHooks),
    }
  }

  pub fn snapshot(&self) -> ListViewState<T> {
    lock(&self.inner.state).view.clone()
  }

  pub fn items(&self) -> Vec<T> {
    lock(&self.inner.state).view.items.clone()
  }

  pub fn is_loading(&self) -> bool {
    lock(&self.inner.state).view.loading
  }

  /// User-facing message of the last committed failure
  pub fn error(&self) -> Option<String> {
    lock(&self.inner.state).view.error.clone()
  }

  pub fn last_error(&self) -> Option<ApiError> {
    lock(&self.inner.state).last_error.clone()
  }

  pub fn pagination(&self) -> PaginationMeta {
    lock(&self.inner.state).view.pagination.clone()
  }

  pub fn filters(&self) -> FilterState {
    lock(&self.inner.state).view.filters.clone()
  }

  pub fn sort(&self) -> SortState {
    lock(&self.inner.state).view.sort.clone()
  }

  pub fn page(&self) -> PaginationState {
    lock(&self.inner.state).view.page
  }

  pub fn query(&self) -> ListQuery {
    lock(&self.inner.state).view.query()
  }

  /// Parameters the next fetch would send, without extras.
  pub fn params(&self) -> Params {
    let mut params = self.query().to_params(&QueryKeys::DEFAULT);
    params.retain(|_, value| !value.is_blank());
    params
  }

  pub fn options(&self) -> &ListOptions {
    &self.inner.options
  }

  pub fn endpoint(&self) -> &str {
    &self.inner.options.endpoint
  }

  pub fn coordinator(&self) -> &RequestCoordinator {
    &self.inner.coordinator
  }

  pub fn hooks(&self) -> &Arc<dyn ListHooks<T>> {
    &self.inner.hooks
  }

  pub fn router(&self) -> Option<&Arc<dyn Router>> {
    self.inner.router.as_ref()
  }

  /// Fetch the current page, serving it from cache when possible.
  ///
  /// `extra` parameters are merged over the state-derived ones for this call
  /// only.
  pub async fn fetch_data(&self, extra: Option<Params>) -> Result<ListPage<T>, ApiError> {
    self.inner.fetch(extra, FetchMode::CacheFirst).await
  }

  /// Fetch the current page from the network, replacing any cached copy.
  pub async fn refresh(&self) -> Result<ListPage<T>, ApiError> {
    self.debounced.cancel();
    self.inner.fetch(None, FetchMode::NetworkOnly).await
  }

  /// Schedule a fetch after the configured quiet period.
  pub fn debounced_fetch(&self, extra: Option<Params>) {
    self.debounced.call(extra);
  }

  pub fn cancel_pending_fetch(&self) {
    self.debounced.cancel();
  }

  /// Start the pending debounced fetch now; false if none was pending.
  pub fn flush_pending_fetch(&self) -> bool {
    let pending = self.debounced.pending();
    self.debounced.flush();
    pending
  }

  pub fn has_pending_fetch(&self) -> bool {
    self.debounced.pending()
  }

  /// Merge filter updates; blank values clear their key and keys outside
  /// the view's whitelist are ignored.
  ///
  /// Returns false, without touching the URL or fetching, when nothing
  /// changed. Otherwise the page resets to 1 (if configured), the URL is
  /// rewritten at once and a debounced fetch is scheduled.
  pub fn update_filters<I, K, V>(&self, updates: I) -> bool
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<FilterValue>,
  {
    let mut next = self.query();
    for (key, value) in updates {
      let key = key.into();
      if !self.inner.options.accepts_filter(&key) {
        debug!(key = %key, endpoint = %self.endpoint(), "Ignoring unknown filter");
        continue;
      }
      next.filters.set(key, value);
    }

    let current = self.query();
    if next.filters == current.filters {
      return false;
    }
    if self.inner.options.reset_page_on_filter {
      next.page.current_page = 1;
    }

    if !self.apply(&next) {
      return false;
    }
    self.debounced.call(None);
    true
  }

  pub fn set_filter(&self, key: impl Into<String>, value: impl Into<FilterValue>) -> bool {
    self.update_filters([(key.into(), value.into())])
  }

  /// Restore default filters and sort on page 1, keeping the page size.
  pub async fn reset_filters(&self) -> bool {
    let current = self.query();
    let mut next = self.inner.options.defaults();
    next.page.per_page = current.page.per_page;
    self.apply_and_fetch(next).await
  }

  /// Go to `page`; values below 1 are clamped to 1.
  pub async fn change_page(&self, page: i64) -> bool {
    let mut next = self.query();
    next.page.current_page = PaginationState::clamp_page(page);
    self.apply_and_fetch(next).await
  }

  /// Change the page size and go back to page 1. Non-positive sizes restore
  /// the configured default.
  pub async fn change_page_size(&self, per_page: i64) -> bool {
    let mut next = self.query();
    next.page.per_page = match u32::try_from(per_page) {
      Ok(per_page) if per_page > 0 => per_page,
      _ => self.inner.options.per_page,
    };
    next.page.current_page = 1;
    self.apply_and_fetch(next).await
  }

  pub async fn change_sort(&self, sort: SortState) -> bool {
    let mut next = self.query();
    next.sort = sort;
    self.apply_and_fetch(next).await
  }

  /// Replace the state with what the router's current location says,
  /// without writing the URL or fetching.
  pub fn load_from_url(&self) -> bool {
    let Some(router) = &self.inner.router else {
      return false;
    };
    let next = self.inner.mirror.load(&router.location());
    self.inner.commit(&next)
  }

  /// React to the router having moved (link, back or forward).
  ///
  /// Leaving the view's path resets state to defaults when configured.
  /// Coming back, or a query-only change, re-reads the URL and fetches.
  /// Returns whether a fetch was made.
  pub async fn handle_route_change(&self) -> bool {
    let (Some(router), Some(home_path)) = (&self.inner.router, &self.inner.home_path) else {
      return false;
    };
    let location = router.location();

    let previous = lock(&self.inner.state)
      .route_path
      .replace(location.path.clone())
      .unwrap_or_else(|| home_path.clone());

    match self.inner.mirror.classify(&previous, &location) {
      RouteChange::PathChanged => {
        self.debounced.cancel();
        if location.path != *home_path {
          if self.inner.options.reset_on_route_change {
            debug!(from = %previous, to = %location.path, "Left list view, resetting state");
            self.inner.commit(&self.inner.options.defaults());
          }
          return false;
        }
        self.inner.commit(&self.inner.mirror.load(&location));
        let _ = self.inner.fetch(None, FetchMode::CacheFirst).await;
        true
      }
      RouteChange::QueryChanged => {
        if location.path != *home_path {
          return false;
        }
        if !self.inner.commit(&self.inner.mirror.load(&location)) {
          return false;
        }
        self.debounced.cancel();
        let _ = self.inner.fetch(None, FetchMode::CacheFirst).await;
        true
      }
    }
  }

  /// Spawn a task running [`handle_route_change`](Self::handle_route_change)
  /// after every navigation. Abort the handle to stop watching.
  pub fn watch_route(&self) -> Option<JoinHandle<()>> {
    let router = self.inner.router.as_ref()?;
    let mut changes = router.subscribe();
    let controller = self.clone();

    Some(tokio::spawn(async move {
      while changes.changed().await.is_ok() {
        controller.handle_route_change().await;
      }
    }))
  }

  /// Drop every cached response of the shared cache.
  pub fn clear_cache(&self) {
    self.inner.coordinator.clear_cache();
  }

  /// Drop the cached pages of this list only.
  pub fn invalidate_cache(&self) -> usize {
    self.inner.coordinator.invalidate(self.endpoint())
  }

  fn apply(&self, next: &ListQuery) -> bool {
    if !self.inner.commit(next) {
      return false;
    }
    if let Some(router) = &self.inner.router {
      self.inner.mirror.write(router.as_ref(), next);
    }
    true
  }

  async fn apply_and_fetch(&self, next: ListQuery) -> bool {
    if !self.apply(&next) {
      return false;
    }
    self.debounced.cancel();
    let _ = self.inner.fetch(None, FetchMode::CacheFirst).await;
    true
  }
}
