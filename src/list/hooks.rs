//! Per-view customization points.

use serde_json::Value;

use crate::api::PaginationMeta;

/// Optional hooks a list view can install. Every method has a pass-through
/// default.
pub trait ListHooks<T>: Send + Sync {
  /// Rewrite each item after it has been decoded.
  fn transform_item(&self, item: T) -> T {
    item
  }

  /// Called after a page has been committed to the view state.
  fn after_fetch(&self, _items: &[T], _meta: &PaginationMeta) {}

  /// Rewrite a create or update payload before it is sent.
  fn before_submit(&self, payload: Value) -> Value {
    payload
  }
}

/// Hooks that change nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityHooks;

impl<T> ListHooks<T> for IdentityHooks {}
