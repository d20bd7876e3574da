//! Cache key generation.
//!
//! A key is the SHA-256 of the scope (endpoint) and the canonical JSON of the
//! effective request parameters. Canonical means object keys are sorted at
//! every depth, so logically equal parameter sets hash identically no matter
//! how they were built.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::api::{ParamValue, Params};

/// A deterministic cache key plus the readable input it was derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
  hash: String,
  scope: String,
  canonical: String,
}

impl CacheKey {
  pub fn new(scope: &str, params: &Value) -> Self {
    let mut canonical = String::new();
    write_canonical(params, &mut canonical);

    let mut hasher = Sha256::new();
    hasher.update(scope.as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical.as_bytes());

    Self {
      hash: hex::encode(hasher.finalize()),
      scope: scope.to_string(),
      canonical,
    }
  }

  pub fn for_params(scope: &str, params: &Params) -> Self {
    let value = Value::Object(
      params
        .iter()
        .map(|(key, value)| {
          let value = match value {
            ParamValue::Single(v) => Value::String(v.clone()),
            ParamValue::Many(vs) => {
              Value::Array(vs.iter().cloned().map(Value::String).collect())
            }
          };
          (key.clone(), value)
        })
        .collect(),
    );
    Self::new(scope, &value)
  }

  pub fn as_str(&self) -> &str {
    &self.hash
  }

  /// Endpoint the key belongs to, used for scope invalidation
  pub fn scope(&self) -> &str {
    &self.scope
  }

  pub fn description(&self) -> String {
    format!("{} {}", self.scope, self.canonical)
  }
}

/// Key for `params` under `scope`; see [`CacheKey`].
pub fn generate_cache_key(scope: &str, params: &Value) -> String {
  CacheKey::new(scope, params).hash
}

fn write_canonical(value: &Value, out: &mut String) {
  match value {
    Value::Object(map) => {
      let mut entries: Vec<_> = map.iter().collect();
      entries.sort_by(|(a, _), (b, _)| a.cmp(b));

      out.push('{');
      for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_canonical(value, out);
      }
      out.push('}');
    }
    Value::Array(items) => {
      out.push('[');
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        write_canonical(item, out);
      }
      out.push(']');
    }
    scalar => out.push_str(&scalar.to_string()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_key_ignores_insertion_order() {
    let mut a = serde_json::Map::new();
    a.insert("search".into(), json!("john"));
    a.insert("page".into(), json!(2));
    a.insert("nested".into(), json!({"b": 1, "a": [1, 2]}));

    let mut b = serde_json::Map::new();
    b.insert("nested".into(), json!({"a": [1, 2], "b": 1}));
    b.insert("page".into(), json!(2));
    b.insert("search".into(), json!("john"));

    assert_eq!(
      generate_cache_key("/api/admin/users", &Value::Object(a)),
      generate_cache_key("/api/admin/users", &Value::Object(b))
    );
  }

  #[test]
  fn test_key_depends_on_values_and_scope() {
    let params = json!({"page": 1});
    let users = generate_cache_key("/api/admin/users", &params);

    assert_ne!(users, generate_cache_key("/api/admin/posts", &params));
    assert_ne!(users, generate_cache_key("/api/admin/users", &json!({"page": 2})));
    // Array order is meaningful
    assert_ne!(
      generate_cache_key("/x", &json!({"ids": [1, 2]})),
      generate_cache_key("/x", &json!({"ids": [2, 1]}))
    );
  }

  #[test]
  fn test_key_is_fixed_length_hex() {
    let key = generate_cache_key("/api/admin/users", &json!({}));
    assert_eq!(key.len(), 64);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn test_for_params_matches_equivalent_json() {
    let mut params = Params::new();
    params.insert("status".into(), ParamValue::Many(vec!["a".into(), "b".into()]));
    params.insert("search".into(), ParamValue::from("john"));

    let key = CacheKey::for_params("/api/admin/users", &params);
    assert_eq!(
      key.as_str(),
      generate_cache_key("/api/admin/users", &json!({"search": "john", "status": ["a", "b"]}))
    );
    assert_eq!(
      key.description(),
      r#"/api/admin/users {"search":"john","status":["a","b"]}"#
    );
  }
}
