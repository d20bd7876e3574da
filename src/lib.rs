//! List-view state synchronization and request coalescing for admin consoles.
//!
//! The engine owns filters, sort and pagination for a list view, mirrors them
//! into the route's query string, debounces and deduplicates fetches against
//! a JSON admin API, and serves short-lived cached responses.
//!
//! The pieces, leaf-first:
//! - [`debounce`]: delayed, cancellable function calls
//! - [`cache`]: response cache and cache-key generation
//! - [`api`]: HTTP transport adapter with token injection, error
//!   normalization and in-flight deduplication
//! - [`coordinator`]: the shared service owning the cache and the adapter
//! - [`url_state`]: route locations, routers and the URL state mirror
//! - [`list`]: the list state controller
//! - [`crud`]: create/update/delete and selection on top of a list
//!
//! Around them, [`config`] loads settings from YAML and the environment,
//! [`resources`] names the console's lists and [`tree`] arranges nested
//! records such as categories.

pub mod api;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod crud;
pub mod debounce;
pub mod list;
pub mod resources;
pub mod tree;
pub mod url_state;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
