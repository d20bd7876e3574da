//! Two-way mapping between a list query and the URL query string.
//!
//! Values equal to their defaults are left out of the URL, and query
//! parameters the list does not own are carried through untouched. Filter
//! lists are written as `key[]`; repeated plain keys are also read as lists.
//! A filter or sort cleared away from its default is written with an empty
//! value.

use tracing::debug;

use super::location::Location;
use super::router::{NavigationMode, Router};
use crate::list::{FilterValue, ListQuery, PaginationState, QueryKeys, SortOrder};

/// Kind of route transition seen by a list view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteChange {
  /// Navigated to another page
  PathChanged,
  /// Same page, possibly different query (including back/forward)
  QueryChanged,
}

#[derive(Debug, Clone)]
pub struct UrlStateMirror {
  /// Keys treated as filters; empty means every key the list does not
  /// otherwise own
  filter_keys: Vec<String>,
  keys: QueryKeys,
  defaults: ListQuery,
}

impl UrlStateMirror {
  pub fn new(filter_keys: Vec<String>, defaults: ListQuery) -> Self {
    Self {
      filter_keys,
      keys: QueryKeys::DEFAULT,
      defaults,
    }
  }

  pub fn with_keys(mut self, keys: QueryKeys) -> Self {
    self.keys = keys;
    self
  }

  pub fn defaults(&self) -> &ListQuery {
    &self.defaults
  }

  /// Read list state from a location, falling back to defaults for missing
  /// or malformed values.
  ///
  /// A filter key present with an empty value means "explicitly cleared",
  /// which differs from a missing key when that filter has a default.
  pub fn load(&self, location: &Location) -> ListQuery {
    let mut query = self.defaults.clone();

    for key in self.filter_keys_in(location) {
      if let Some(value) = filter_value(location, &key) {
        query.filters.remove(&key);
        query.filters.set(key, value);
      }
    }

    // An empty sort value clears a default sort
    if let Some(sort_by) = location.get(self.keys.sort_by) {
      let sort_by = sort_by.trim();
      query.sort.sort_by = (!sort_by.is_empty()).then(|| sort_by.to_string());
    }
    if let Some(order) = location.get(self.keys.sort_order) {
      match order.trim() {
        "" => query.sort.sort_order = None,
        order => match order.parse::<SortOrder>() {
          Ok(order) => query.sort.sort_order = Some(order),
          Err(()) => debug!(order, "Ignoring malformed sort order in URL"),
        },
      }
    }

    if let Some(page) = location.get(self.keys.page) {
      match page.trim().parse::<i64>() {
        Ok(page) => query.page.current_page = PaginationState::clamp_page(page),
        Err(_) => debug!(page, "Ignoring malformed page in URL"),
      }
    }
    if let Some(per_page) = location.get(self.keys.per_page) {
      match per_page.trim().parse::<u32>() {
        Ok(per_page) if per_page > 0 => query.page.per_page = per_page,
        _ => debug!(per_page, "Ignoring malformed page size in URL"),
      }
    }

    query
  }

  /// The location that mirrors `state`, keeping unrelated parameters of
  /// `current`.
  pub fn to_location(&self, current: &Location, state: &ListQuery) -> Location {
    let mut next = Location {
      path: current.path.clone(),
      query: current.query.clone(),
    };
    let owned: Vec<String> = next
      .query
      .keys()
      .filter(|key| self.owns(key))
      .cloned()
      .collect();
    for key in owned {
      next.query.remove(&key);
    }

    for (key, value) in state.filters.iter() {
      if self.defaults.filters.get(key) != Some(value) {
        let name = match value {
          FilterValue::Many(_) => format!("{}[]", key),
          FilterValue::Single(_) => key.clone(),
        };
        let values = value.values().into_iter().map(str::to_string).collect();
        next.query.insert(name, values);
      }
    }
    // A cleared filter that has a default must still be visible in the URL
    for key in self.defaults.filters.keys() {
      if state.filters.get(key).is_none() {
        next.query.insert(key.clone(), vec![String::new()]);
      }
    }

    if state.sort.sort_by != self.defaults.sort.sort_by {
      let sort_by = state.sort.sort_by.clone().unwrap_or_default();
      next.query.insert(self.keys.sort_by.to_string(), vec![sort_by]);
    }
    if state.sort.sort_order != self.defaults.sort.sort_order {
      let order = state
        .sort
        .sort_order
        .map(|order| order.to_string())
        .unwrap_or_default();
      next.query.insert(self.keys.sort_order.to_string(), vec![order]);
    }
    if state.page.current_page != 1 {
      next.query.insert(
        self.keys.page.to_string(),
        vec![state.page.current_page.to_string()],
      );
    }
    if state.page.per_page != self.defaults.page.per_page {
      next.query.insert(
        self.keys.per_page.to_string(),
        vec![state.page.per_page.to_string()],
      );
    }

    next
  }

  /// Replace the router's current entry with the mirrored state.
  ///
  /// Returns false without navigating when the URL already matches.
  pub fn write(&self, router: &dyn Router, state: &ListQuery) -> bool {
    let current = router.location();
    let next = self.to_location(&current, state);
    if next == current {
      return false;
    }
    debug!(from = %current, to = %next, "Writing list state to URL");
    router.navigate(next, NavigationMode::Replace);
    true
  }

  /// How `location` differs from a view last seen at `previous_path`.
  pub fn classify(&self, previous_path: &str, location: &Location) -> RouteChange {
    if location.path != previous_path {
      RouteChange::PathChanged
    } else {
      RouteChange::QueryChanged
    }
  }

  fn owns(&self, key: &str) -> bool {
    if self.keys.contains(key) {
      return true;
    }
    let base = key.strip_suffix("[]").unwrap_or(key);
    if self.filter_keys.is_empty() {
      true
    } else {
      self.filter_keys.iter().any(|k| k == base)
    }
  }

  fn filter_keys_in(&self, location: &Location) -> Vec<String> {
    if !self.filter_keys.is_empty() {
      return self.filter_keys.clone();
    }
    let mut keys: Vec<String> = location
      .query
      .keys()
      .filter(|key| !self.keys.contains(key))
      .map(|key| key.strip_suffix("[]").unwrap_or(key).to_string())
      .collect();
    keys.sort();
    keys.dedup();
    keys
  }
}

/// Filter under `key` or `key[]`; `None` when neither is present.
///
/// The bracketed form and repeated keys both yield a list.
fn filter_value(location: &Location, key: &str) -> Option<FilterValue> {
  let bracketed = format!("{}[]", key);
  if !location.contains(key) && !location.contains(&bracketed) {
    return None;
  }
  let mut values: Vec<String> = location
    .get_all(key)
    .iter()
    .chain(location.get_all(&bracketed))
    .cloned()
    .collect();
  if values.len() == 1 && !location.contains(&bracketed) {
    return values.pop().map(FilterValue::Single);
  }
  Some(FilterValue::Many(values))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::list::{FilterState, SortState};
  use crate::url_state::MemoryRouter;

  fn mirror() -> UrlStateMirror {
    UrlStateMirror::new(vec!["search".into(), "status".into()], ListQuery::new(10))
  }

  #[test]
  fn test_load_reads_filters_sort_and_page() {
    let location = Location::from(
      "/admin/users?search=john&status=active&status=banned&sort_by=name&sort_order=DESC&page=2",
    );
    let query = mirror().load(&location);

    assert_eq!(query.filters.get("search"), Some(&FilterValue::from("john")));
    assert_eq!(
      query.filters.get("status"),
      Some(&FilterValue::Many(vec!["active".into(), "banned".into()]))
    );
    assert_eq!(query.sort, SortState::by("name", SortOrder::Desc));
    assert_eq!(query.page.current_page, 2);
    assert_eq!(query.page.per_page, 10);
  }

  #[test]
  fn test_load_falls_back_on_malformed_values() {
    let location = Location::from("/admin/users?page=abc&per_page=0&sort_order=up&role=admin");
    let query = mirror().load(&location);
    assert_eq!(query, ListQuery::new(10));

    let query = mirror().load(&Location::from("/admin/users?page=-3"));
    assert_eq!(query.page.current_page, 1);
  }

  #[test]
  fn test_load_accepts_bracketed_lists() {
    let query = mirror().load(&Location::from("/admin/users?status[]=a&status[]=b"));
    assert_eq!(
      query.filters.get("status"),
      Some(&FilterValue::Many(vec!["a".into(), "b".into()]))
    );
  }

  #[test]
  fn test_single_element_list_round_trips() {
    let mut state = ListQuery::new(10);
    state.filters.set("status", FilterValue::Many(vec!["active".into()]));

    let location = mirror().to_location(&Location::from("/admin/users"), &state);
    assert_eq!(location.to_string(), "/admin/users?status%5B%5D=active");
    assert_eq!(mirror().load(&location), state);
  }

  #[test]
  fn test_classify() {
    let m = mirror();
    assert_eq!(
      m.classify("/admin/users", &Location::from("/admin/users?page=2")),
      RouteChange::QueryChanged
    );
    assert_eq!(
      m.classify("/admin/users", &Location::from("/admin/orders")),
      RouteChange::PathChanged
    );
  }

  #[test]
  fn test_defaults_are_omitted() {
    let current = Location::from("/admin/users");
    assert_eq!(mirror().to_location(&current, &ListQuery::new(10)), current);
  }

  #[test]
  fn test_unrelated_params_survive() {
    let current = Location::from("/admin/users?tab=audit&search=old&page=4");
    let mut state = ListQuery::new(10);
    state.filters.set("search", "new");

    let next = mirror().to_location(&current, &state);
    assert_eq!(next.to_string(), "/admin/users?search=new&tab=audit");
  }

  #[test]
  fn test_round_trip() {
    let mut state = ListQuery::new(10);
    state.filters.set("search", "jane");
    state
      .filters
      .set("status", FilterValue::Many(vec!["active".into(), "pending".into()]));
    state.sort = SortState::by("created_at", SortOrder::Asc);
    state.page.current_page = 3;
    state.page.per_page = 25;

    let m = mirror();
    let location = m.to_location(&Location::from("/admin/users"), &state);
    assert_eq!(m.load(&location), state);
  }

  #[test]
  fn test_cleared_default_filter_round_trips() {
    let defaults = ListQuery {
      filters: FilterState::new().with("status", "active"),
      ..ListQuery::new(10)
    };
    let m = UrlStateMirror::new(vec!["status".into()], defaults.clone());

    let location = m.to_location(&Location::from("/admin/users"), &defaults);
    assert_eq!(location.to_string(), "/admin/users");

    let cleared = ListQuery::new(10);
    let location = m.to_location(&Location::from("/admin/users"), &cleared);
    assert_eq!(location.to_string(), "/admin/users?status=");
    assert_eq!(m.load(&location), cleared);
    assert_eq!(m.load(&Location::from("/admin/users")), defaults);
  }

  #[test]
  fn test_cleared_default_sort_round_trips() {
    let defaults = ListQuery {
      sort: SortState::by("created_at", SortOrder::Desc),
      ..ListQuery::new(10)
    };
    let m = UrlStateMirror::new(vec!["status".into()], defaults.clone());

    let cleared = ListQuery::new(10);
    let location = m.to_location(&Location::from("/admin/orders?sort_by=total"), &cleared);
    assert_eq!(location.to_string(), "/admin/orders?sort_by=&sort_order=");
    assert_eq!(m.load(&location), cleared);

    let mut by_total = defaults.clone();
    by_total.sort.sort_by = Some("total".into());
    let location = m.to_location(&Location::from("/admin/orders"), &by_total);
    assert_eq!(location.to_string(), "/admin/orders?sort_by=total");
    assert_eq!(m.load(&location), by_total);

    assert_eq!(m.load(&Location::from("/admin/orders")), defaults);
  }

  #[test]
  fn test_write_is_skipped_when_unchanged() {
    let router = MemoryRouter::new("/admin/users?page=2");
    let mut state = ListQuery::new(10);
    state.page.current_page = 2;

    assert!(!mirror().write(&router, &state));
    assert_eq!(router.navigations(), 0);

    state.page.current_page = 3;
    assert!(mirror().write(&router, &state));
    assert_eq!(router.location().to_string(), "/admin/users?page=3");
    assert_eq!(router.history_len(), 1);
  }
}
