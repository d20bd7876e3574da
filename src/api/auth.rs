//! Bearer-token sources for the transport adapter.

/// Supplies the current bearer token, read once per request.
///
/// `None` is not an error: the request goes out unauthenticated and the
/// server answers 401/403.
pub trait TokenProvider: Send + Sync {
  fn token(&self) -> Option<String>;
}

/// Never authenticates
pub struct NoToken;

impl TokenProvider for NoToken {
  fn token(&self) -> Option<String> {
    None
  }
}

/// A fixed token
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
  fn token(&self) -> Option<String> {
    Some(self.0.clone())
  }
}

/// Reads the first non-empty variable from a list of environment variables.
///
/// Looked up on every request so a refreshed token is picked up without
/// rebuilding the client.
pub struct EnvToken {
  vars: Vec<&'static str>,
}

impl EnvToken {
  pub fn new(vars: &[&'static str]) -> Self {
    Self {
      vars: vars.to_vec(),
    }
  }
}

impl TokenProvider for EnvToken {
  fn token(&self) -> Option<String> {
    self
      .vars
      .iter()
      .filter_map(|var| std::env::var(var).ok())
      .find(|value| !value.trim().is_empty())
  }
}
