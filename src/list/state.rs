//! Filter, sort and pagination state of a list view.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::api::{PaginationMeta, ParamValue, Params};
use crate::cache::CacheSource;

/// A filter value; blank values mean "no filter"
pub type FilterValue = ParamValue;

/// Query parameter names used for sort and pagination, in the URL and on the
/// wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryKeys {
  pub page: &'static str,
  pub per_page: &'static str,
  pub sort_by: &'static str,
  pub sort_order: &'static str,
}

impl QueryKeys {
  pub const DEFAULT: QueryKeys = QueryKeys {
    page: "page",
    per_page: "per_page",
    sort_by: "sort_by",
    sort_order: "sort_order",
  };

  pub fn contains(&self, key: &str) -> bool {
    [self.page, self.per_page, self.sort_by, self.sort_order].contains(&key)
  }
}

impl Default for QueryKeys {
  fn default() -> Self {
    Self::DEFAULT
  }
}

/// Active filters by key. Blank values are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState(BTreeMap<String, FilterValue>);

impl FilterState {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder form of [`FilterState::set`].
  pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
    self.set(key, value);
    self
  }

  /// Set a filter; a blank value removes it.
  pub fn set(&mut self, key: impl Into<String>, value: impl Into<FilterValue>) {
    let key = key.into();
    match value.into().normalized() {
      Some(value) => {
        self.0.insert(key, value);
      }
      None => {
        self.0.remove(&key);
      }
    }
  }

  pub fn get(&self, key: &str) -> Option<&FilterValue> {
    self.0.get(key)
  }

  pub fn remove(&mut self, key: &str) -> Option<FilterValue> {
    self.0.remove(key)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
    self.0.iter()
  }

  pub fn keys(&self) -> impl Iterator<Item = &String> {
    self.0.keys()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
  Asc,
  Desc,
}

impl SortOrder {
  pub fn as_str(&self) -> &'static str {
    match self {
      SortOrder::Asc => "asc",
      SortOrder::Desc => "desc",
    }
  }
}

impl FromStr for SortOrder {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "asc" => Ok(SortOrder::Asc),
      "desc" => Ok(SortOrder::Desc),
      _ => Err(()),
    }
  }
}

impl fmt::Display for SortOrder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Requested ordering; no `sort_by` means the server's default order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
  pub sort_by: Option<String>,
  pub sort_order: Option<SortOrder>,
}

impl SortState {
  pub fn by(field: impl Into<String>, order: SortOrder) -> Self {
    Self {
      sort_by: Some(field.into()),
      sort_order: Some(order),
    }
  }
}

/// Requested page; `current_page >= 1` and `per_page > 0` always hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
  pub current_page: u32,
  pub per_page: u32,
}

impl PaginationState {
  pub fn new(per_page: u32) -> Self {
    Self {
      current_page: 1,
      per_page: per_page.max(1),
    }
  }

  /// Clamp an arbitrary requested page to a valid one.
  pub fn clamp_page(page: i64) -> u32 {
    page.clamp(1, u32::MAX as i64) as u32
  }
}

/// The part of a list view that is mirrored into the URL and sent to the
/// server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
  pub filters: FilterState,
  pub sort: SortState,
  pub page: PaginationState,
}

impl ListQuery {
  pub fn new(per_page: u32) -> Self {
    Self {
      filters: FilterState::new(),
      sort: SortState::default(),
      page: PaginationState::new(per_page),
    }
  }

  /// Server parameters: filters, sort, and always page and page size.
  pub fn to_params(&self, keys: &QueryKeys) -> Params {
    let mut params: Params = self
      .filters
      .iter()
      .map(|(key, value)| (key.clone(), value.clone()))
      .collect();

    if let Some(sort_by) = &self.sort.sort_by {
      params.insert(keys.sort_by.to_string(), ParamValue::from(sort_by.as_str()));
    }
    if let Some(order) = self.sort.sort_order {
      params.insert(keys.sort_order.to_string(), ParamValue::from(order.as_str()));
    }
    params.insert(keys.page.to_string(), ParamValue::from(self.page.current_page));
    params.insert(keys.per_page.to_string(), ParamValue::from(self.page.per_page));

    params
  }
}

/// Everything a list view renders. Only the controller writes it.
#[derive(Debug, Clone)]
pub struct ListViewState<T> {
  pub items: Vec<T>,
  pub loading: bool,
  pub error: Option<String>,
  pub pagination: PaginationMeta,
  pub filters: FilterState,
  pub sort: SortState,
  pub page: PaginationState,
}

impl<T> ListViewState<T> {
  pub fn new(query: ListQuery) -> Self {
    Self {
      items: Vec::new(),
      loading: false,
      error: None,
      pagination: PaginationMeta::empty(query.page.per_page),
      filters: query.filters,
      sort: query.sort,
      page: query.page,
    }
  }

  pub fn query(&self) -> ListQuery {
    ListQuery {
      filters: self.filters.clone(),
      sort: self.sort.clone(),
      page: self.page,
    }
  }

  pub(crate) fn set_query(&mut self, query: ListQuery) {
    self.filters = query.filters;
    self.sort = query.sort;
    self.page = query.page;
  }
}

/// One fetched page of typed items
#[derive(Debug, Clone)]
pub struct ListPage<T> {
  pub items: Vec<T>,
  pub meta: PaginationMeta,
  pub source: CacheSource,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_blank_filter_values_are_absent() {
    let mut filters = FilterState::new().with("search", "john").with("status", "");
    assert_eq!(filters.len(), 1);
    assert!(filters.get("status").is_none());

    filters.set("search", "  ");
    assert!(filters.is_empty());
  }

  #[test]
  fn test_sort_order_parsing() {
    assert_eq!("DESC".parse::<SortOrder>(), Ok(SortOrder::Desc));
    assert_eq!(" asc ".parse::<SortOrder>(), Ok(SortOrder::Asc));
    assert!("sideways".parse::<SortOrder>().is_err());
  }

  #[test]
  fn test_page_clamping() {
    assert_eq!(PaginationState::clamp_page(-4), 1);
    assert_eq!(PaginationState::clamp_page(0), 1);
    assert_eq!(PaginationState::clamp_page(7), 7);
    assert_eq!(PaginationState::new(0).per_page, 1);
  }

  #[test]
  fn test_params_always_carry_pagination() {
    let mut query = ListQuery::new(10);
    query.filters.set("search", "john");
    query.page.current_page = 2;

    let params = query.to_params(&QueryKeys::DEFAULT);
    assert_eq!(params.get("search"), Some(&ParamValue::from("john")));
    assert_eq!(params.get("page"), Some(&ParamValue::from("2")));
    assert_eq!(params.get("per_page"), Some(&ParamValue::from("10")));
    assert!(params.get("sort_by").is_none());

    query.sort = SortState::by("created_at", SortOrder::Desc);
    let params = query.to_params(&QueryKeys::DEFAULT);
    assert_eq!(params.get("sort_by"), Some(&ParamValue::from("created_at")));
    assert_eq!(params.get("sort_order"), Some(&ParamValue::from("desc")));
  }
}
