//! Admin resources, their list endpoints and name lookup

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ListsConfig;
use crate::crud::Identifiable;
use crate::list::{ListOptions, SortOrder, SortState};

#[derive(Debug, Clone)]
pub struct Resource {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  /// API path for list and create; items live under `{endpoint}/{id}`
  pub endpoint: &'static str,
  /// Console page showing the list
  pub route: &'static str,
  pub filter_keys: &'static [&'static str],
  /// Fields shown in a table, in order
  pub columns: &'static [&'static str],
  pub default_sort: Option<(&'static str, SortOrder)>,
  /// Items carry a `parent_id` and form a tree
  pub nested: bool,
}

/// All known resources
pub const RESOURCES: &[Resource] = &[
  Resource {
    name: "users",
    aliases: &["u", "user", "customers"],
    description: "Accounts and roles",
    endpoint: "/api/admin/users",
    route: "/admin/users",
    filter_keys: &["search", "role", "status"],
    columns: &["id", "name", "email", "role", "status", "created_at"],
    default_sort: None,
    nested: false,
  },
  Resource {
    name: "products",
    aliases: &["p", "product", "catalog"],
    description: "Catalog items and stock",
    endpoint: "/api/admin/products",
    route: "/admin/products",
    filter_keys: &["search", "category_id", "status", "stock_status"],
    columns: &["id", "name", "sku", "price", "stock", "status"],
    default_sort: None,
    nested: false,
  },
  Resource {
    name: "orders",
    aliases: &["o", "order"],
    description: "Customer orders",
    endpoint: "/api/admin/orders",
    route: "/admin/orders",
    filter_keys: &["search", "status", "payment_status", "date_from", "date_to"],
    columns: &["id", "order_number", "customer_name", "status", "total", "created_at"],
    default_sort: Some(("created_at", SortOrder::Desc)),
    nested: false,
  },
  Resource {
    name: "posts",
    aliases: &["post", "blog", "articles"],
    description: "Blog posts",
    endpoint: "/api/admin/posts",
    route: "/admin/posts",
    filter_keys: &["search", "status", "author_id"],
    columns: &["id", "title", "author", "status", "published_at"],
    default_sort: Some(("published_at", SortOrder::Desc)),
    nested: false,
  },
  Resource {
    name: "categories",
    aliases: &["c", "category"],
    description: "Product categories",
    endpoint: "/api/admin/categories",
    route: "/admin/categories",
    filter_keys: &["search", "parent_id"],
    columns: &["id", "name", "slug", "parent_id"],
    default_sort: None,
    nested: true,
  },
  Resource {
    name: "shipping-zones",
    aliases: &["z", "zones", "shipping"],
    description: "Shipping zones and rates",
    endpoint: "/api/admin/shipping-zones",
    route: "/admin/shipping-zones",
    filter_keys: &["search", "is_active"],
    columns: &["id", "name", "countries", "is_active"],
    default_sort: None,
    nested: false,
  },
];

impl Resource {
  /// List options for this resource with defaults from the config file.
  pub fn list_options(&self, config: &ListsConfig) -> ListOptions {
    let mut options =
      ListOptions::from_config(self.endpoint, config).filter_keys(self.filter_keys.iter().copied());
    if let Some((field, order)) = self.default_sort {
      options = options.default_sort(SortState::by(field, order));
    }
    options
  }
}

/// Get resources matching `input`, best match first
pub fn get_suggestions(input: &str) -> Vec<&'static Resource> {
  ranked(input).into_iter().map(|(resource, _)| resource).collect()
}

/// Resolve a name, alias or unambiguous prefix
pub fn find(input: &str) -> Option<&'static Resource> {
  match ranked(input).as_slice() {
    [(only, _)] => Some(*only),
    [(best, p0), (_, p1), ..] if p0 < p1 => Some(*best),
    _ => None,
  }
}

fn ranked(input: &str) -> Vec<(&'static Resource, u32)> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return RESOURCES.iter().map(|resource| (resource, 0)).collect();
  }

  let mut matches: Vec<(&'static Resource, u32)> = Vec::new();

  for resource in RESOURCES {
    // Exact match on name
    if resource.name == input_lower {
      matches.push((resource, 0));
      continue;
    }

    if resource.aliases.contains(&input_lower.as_str()) {
      matches.push((resource, 1));
      continue;
    }

    if resource.name.starts_with(&input_lower) {
      matches.push((resource, 2));
      continue;
    }

    if resource.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((resource, 3));
      continue;
    }

    // Fuzzy match (contains)
    if resource.name.contains(&input_lower) {
      matches.push((resource, 4));
    }
  }

  matches.sort_by_key(|(_, priority)| *priority);
  matches
}

/// Untyped list item as returned by the admin API
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
  pub fn get(&self, field: &str) -> Option<&Value> {
    self.0.get(field)
  }

  pub fn parent_id(&self) -> Option<u64> {
    self.get("parent_id").and_then(Value::as_u64)
  }

  /// Field rendered for a table cell
  pub fn display(&self, field: &str) -> String {
    match self.get(field) {
      None | Some(Value::Null) => String::new(),
      Some(Value::String(s)) => s.clone(),
      Some(Value::Array(values)) => values
        .iter()
        .map(|v| match v {
          Value::String(s) => s.clone(),
          other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", "),
      Some(other) => other.to_string(),
    }
  }
}

impl Identifiable for Record {
  fn item_id(&self) -> u64 {
    self.get("id").and_then(Value::as_u64).unwrap_or_default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), RESOURCES.len());
  }

  #[test]
  fn test_exact_and_alias_match() {
    assert_eq!(get_suggestions("orders")[0].name, "orders");
    assert_eq!(get_suggestions("c")[0].name, "categories");
    assert_eq!(get_suggestions("blog")[0].name, "posts");
  }

  #[test]
  fn test_prefix_match() {
    assert_eq!(get_suggestions("ship")[0].name, "shipping-zones");
  }

  #[test]
  fn test_find() {
    assert_eq!(find("u").map(|r| r.name), Some("users"));
    assert_eq!(find("Products").map(|r| r.name), Some("products"));
    assert_eq!(find("cat").map(|r| r.name), Some("categories"));
    assert!(find("invoices").is_none());
    // Matches "users" and "orders" equally
    assert!(find("er").is_none());
  }

  #[test]
  fn test_list_options() {
    let orders = find("orders").unwrap();
    let options = orders.list_options(&ListsConfig::default());
    assert_eq!(options.endpoint, "/api/admin/orders");
    assert!(options.accepts_filter("payment_status"));
    assert!(!options.accepts_filter("role"));
    assert_eq!(options.default_sort, SortState::by("created_at", SortOrder::Desc));
  }

  #[test]
  fn test_record_display() {
    let record: Record = serde_json::from_value(json!({
      "id": 7,
      "name": "Europe",
      "countries": ["DE", "FR"],
      "is_active": true,
      "parent_id": null
    }))
    .unwrap();
    assert_eq!(record.item_id(), 7);
    assert_eq!(record.display("countries"), "DE, FR");
    assert_eq!(record.display("is_active"), "true");
    assert_eq!(record.display("parent_id"), "");
    assert_eq!(record.parent_id(), None);
  }
}
