//! Wire types shared by the admin API endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// HTTP method of an API call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
  Get,
  Post,
  Put,
  Patch,
  Delete,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Patch => "PATCH",
      Method::Delete => "DELETE",
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A query parameter value: one string or a list of strings.
///
/// Blank values (empty or whitespace-only strings, lists with no non-blank
/// entries) count as absent and are never sent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
  Single(String),
  Many(Vec<String>),
}

impl ParamValue {
  pub fn is_blank(&self) -> bool {
    match self {
      ParamValue::Single(value) => value.trim().is_empty(),
      ParamValue::Many(values) => values.iter().all(|v| v.trim().is_empty()),
    }
  }

  /// Drop blank list entries; `None` if nothing meaningful remains.
  pub fn normalized(self) -> Option<Self> {
    let value = match self {
      ParamValue::Many(values) => {
        ParamValue::Many(values.into_iter().filter(|v| !v.trim().is_empty()).collect())
      }
      single => single,
    };
    if value.is_blank() {
      None
    } else {
      Some(value)
    }
  }

  /// All contained strings, in order.
  pub fn values(&self) -> Vec<&str> {
    match self {
      ParamValue::Single(value) => vec![value.as_str()],
      ParamValue::Many(values) => values.iter().map(String::as_str).collect(),
    }
  }
}

impl From<&str> for ParamValue {
  fn from(value: &str) -> Self {
    ParamValue::Single(value.to_string())
  }
}

impl From<String> for ParamValue {
  fn from(value: String) -> Self {
    ParamValue::Single(value)
  }
}

impl From<u32> for ParamValue {
  fn from(value: u32) -> Self {
    ParamValue::Single(value.to_string())
  }
}

impl From<Vec<String>> for ParamValue {
  fn from(values: Vec<String>) -> Self {
    ParamValue::Many(values)
  }
}

impl fmt::Display for ParamValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.values().join(","))
  }
}

/// Query parameters keyed by name, kept in a stable order
pub type Params = BTreeMap<String, ParamValue>;

/// Field name to validation messages, as returned with HTTP 422
pub type ValidationErrors = BTreeMap<String, Vec<String>>;

/// One entry of the paginator's `links` array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
  pub url: Option<String>,
  #[serde(default)]
  pub label: String,
  #[serde(default)]
  pub active: bool,
}

/// Server-reported pagination for a list response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
  #[serde(default = "first_page")]
  pub current_page: u32,
  #[serde(default)]
  pub from: Option<u64>,
  #[serde(default)]
  pub to: Option<u64>,
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub per_page: u32,
  #[serde(default = "first_page")]
  pub last_page: u32,
  #[serde(default)]
  pub links: Vec<PageLink>,
}

fn first_page() -> u32 {
  1
}

impl PaginationMeta {
  /// Meta for a list that has not been fetched yet
  pub fn empty(per_page: u32) -> Self {
    Self {
      current_page: 1,
      from: None,
      to: None,
      total: 0,
      per_page,
      last_page: 1,
      links: Vec::new(),
    }
  }
}

impl Default for PaginationMeta {
  fn default() -> Self {
    Self::empty(0)
  }
}

/// List endpoint response with untyped items, as cached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPage {
  #[serde(default)]
  pub data: Vec<Value>,
  #[serde(default)]
  pub meta: PaginationMeta,
}

/// Envelope returned by create/update/delete endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct MutationResponse {
  #[serde(default = "succeeded")]
  pub success: bool,
  #[serde(default)]
  pub data: Option<Value>,
  #[serde(default)]
  pub message: Option<String>,
}

fn succeeded() -> bool {
  true
}
