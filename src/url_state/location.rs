//! A router location: path plus a multi-valued query.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use url::form_urlencoded;

/// Query parameters of a location. Repeated keys keep every value in order.
pub type QueryMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
  pub path: String,
  pub query: QueryMap,
}

impl Location {
  pub fn new(path: impl Into<String>) -> Self {
    let path = path.into();
    Self {
      path: if path.is_empty() { "/".to_string() } else { path },
      query: QueryMap::new(),
    }
  }

  /// Append a value for `key`.
  pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.query.entry(key.into()).or_default().push(value.into());
    self
  }

  /// First value of `key`.
  pub fn get(&self, key: &str) -> Option<&str> {
    self.query.get(key).and_then(|values| values.first()).map(String::as_str)
  }

  pub fn get_all(&self, key: &str) -> &[String] {
    self.query.get(key).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn contains(&self, key: &str) -> bool {
    self.query.contains_key(key)
  }

  pub fn query_string(&self) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, values) in &self.query {
      for value in values {
        serializer.append_pair(key, value);
      }
    }
    serializer.finish()
  }
}

impl Default for Location {
  fn default() -> Self {
    Self::new("/")
  }
}

impl FromStr for Location {
  type Err = Infallible;

  /// Parse `/path?query#fragment`; the fragment is dropped.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let without_fragment = s.split('#').next().unwrap_or_default();
    let (path, query) = match without_fragment.split_once('?') {
      Some((path, query)) => (path, query),
      None => (without_fragment, ""),
    };

    let mut location = Location::new(path);
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
      location
        .query
        .entry(key.into_owned())
        .or_default()
        .push(value.into_owned());
    }
    Ok(location)
  }
}

impl From<&str> for Location {
  fn from(s: &str) -> Self {
    match s.parse() {
      Ok(location) => location,
      Err(never) => match never {},
    }
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let query = self.query_string();
    if query.is_empty() {
      f.write_str(&self.path)
    } else {
      write!(f, "{}?{}", self.path, query)
    }
  }
}
