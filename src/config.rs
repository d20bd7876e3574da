use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub lists: ListsConfig,
  /// Base URL given on the command line; beats every other source
  #[serde(skip)]
  pub base_url_override: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the admin API; environment variables take precedence
  pub base_url: Option<String>,
  /// Client-side timeout per request
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: None,
      timeout_secs: default_timeout_secs(),
    }
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs.max(1))
  }
}

/// Defaults for every list view
#[derive(Debug, Clone, Deserialize)]
pub struct ListsConfig {
  #[serde(default = "default_per_page")]
  pub per_page: u32,
  /// Quiet time before a filter change triggers a fetch
  #[serde(default = "default_debounce_ms")]
  pub debounce_ms: u64,
  /// How long list responses are served from cache; 0 disables caching
  #[serde(default = "default_cache_ttl_secs")]
  pub cache_ttl_secs: u64,
  /// Extra attempts for failed list fetches (network, timeout, 5xx only)
  #[serde(default)]
  pub retries: u32,
}

impl Default for ListsConfig {
  fn default() -> Self {
    Self {
      per_page: default_per_page(),
      debounce_ms: default_debounce_ms(),
      cache_ttl_secs: default_cache_ttl_secs(),
      retries: 0,
    }
  }
}

fn default_timeout_secs() -> u64 {
  10
}

fn default_per_page() -> u32 {
  10
}

fn default_debounce_ms() -> u64 {
  300
}

fn default_cache_ttl_secs() -> u64 {
  300
}

impl Config {
  /// Local development API
  pub const DEFAULT_BASE_URL: &'static str = "http://localhost:8000";

  /// Checked in order for the API base URL
  pub const BASE_URL_VARS: &'static [&'static str] = &["ADMIN_LISTS_API_URL", "API_BASE_URL"];

  /// Checked in order for the bearer token
  pub const TOKEN_VARS: &'static [&'static str] = &["ADMIN_LISTS_TOKEN", "API_TOKEN"];

  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./admin-lists.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/admin-lists/config.yaml
  ///
  /// Without any file, defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("admin-lists.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("admin-lists").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// API base URL: command line, environment, config file, then the local
  /// fallback.
  pub fn api_base_url(&self) -> String {
    if let Some(url) = self.base_url_override.as_deref().filter(|u| !u.trim().is_empty()) {
      return url.trim_end_matches('/').to_string();
    }
    let from_env = Self::BASE_URL_VARS
      .iter()
      .filter_map(|var| std::env::var(var).ok())
      .find(|value| !value.trim().is_empty());
    self.resolve_base_url(from_env)
  }

  fn resolve_base_url(&self, from_env: Option<String>) -> String {
    from_env
      .or_else(|| self.api.base_url.clone())
      .filter(|url| !url.trim().is_empty())
      .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string())
      .trim_end_matches('/')
      .to_string()
  }
}
