use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::lock;

use super::auth::{EnvToken, TokenProvider};
use super::error::ApiError;
use super::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use super::types::{Method, ParamValue, Params};

type SharedResponse = Shared<BoxFuture<'static, Result<ApiResponse, ApiError>>>;

/// Successful response with its decoded JSON body (`Null` when empty)
#[derive(Debug, Clone)]
pub struct ApiResponse {
  pub status: u16,
  pub body: Value,
}

/// Query parameters and JSON body of one call
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
  pub params: Params,
  pub body: Option<Value>,
}

impl RequestConfig {
  pub fn params(params: Params) -> Self {
    Self { params, body: None }
  }

  pub fn body(body: Value) -> Self {
    Self {
      params: Params::new(),
      body: Some(body),
    }
  }
}

/// A dispatched call that later identical calls attach to
struct InFlightRequest {
  id: u64,
  method: Method,
  path: String,
  response: SharedResponse,
  started_at: Instant,
}

struct ClientInner {
  transport: Arc<dyn HttpTransport>,
  tokens: Arc<dyn TokenProvider>,
  base_url: String,
  timeout: Duration,
  in_flight: Mutex<HashMap<String, InFlightRequest>>,
  next_id: AtomicU64,
}

/// Admin API client.
///
/// Injects the bearer token, bounds every call with a timeout, normalizes
/// failures into [`ApiError`], and collapses concurrent identical calls into
/// one network round-trip. Clones share the in-flight registry.
#[derive(Clone)]
pub struct ApiClient {
  inner: Arc<ClientInner>,
}

impl ApiClient {
  pub fn new(
    base_url: &str,
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<dyn TokenProvider>,
    timeout: Duration,
  ) -> Self {
    Self {
      inner: Arc::new(ClientInner {
        transport,
        tokens,
        base_url: base_url.trim_end_matches('/').to_string(),
        timeout,
        in_flight: Mutex::new(HashMap::new()),
        next_id: AtomicU64::new(0),
      }),
    }
  }

  /// Client for the configured API using reqwest and the token environment
  /// variables.
  pub fn from_config(config: &Config) -> color_eyre::Result<Self> {
    let timeout = config.api.timeout();
    let transport = ReqwestTransport::new(timeout)
      .map_err(|e| color_eyre::eyre::eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self::new(
      &config.api_base_url(),
      Arc::new(transport),
      Arc::new(EnvToken::new(Config::TOKEN_VARS)),
      timeout,
    ))
  }

  pub fn base_url(&self) -> &str {
    &self.inner.base_url
  }

  /// Number of calls currently awaiting a response
  pub fn in_flight_count(&self) -> usize {
    lock(&self.inner.in_flight).len()
  }

  /// Stop later GETs of `path` from joining the ones already in flight.
  ///
  /// Detached calls still complete for the callers already awaiting them.
  /// Used after a mutation, when a response started earlier may predate it.
  pub fn detach_in_flight(&self, path: &str) -> usize {
    let mut in_flight = lock(&self.inner.in_flight);
    let before = in_flight.len();
    in_flight.retain(|_, request| !(request.method == Method::Get && request.path == path));
    before - in_flight.len()
  }

  /// Issue a call, or join an identical one that is still in flight.
  pub async fn request(
    &self,
    method: Method,
    path: &str,
    config: RequestConfig,
  ) -> Result<ApiResponse, ApiError> {
    let url = self.build_url(path, &config.params).ok_or_else(|| {
      ApiError::invalid_url(method, format!("{}{}", self.inner.base_url, path))
    })?;

    let body = match &config.body {
      Some(body) => {
        Some(serde_json::to_vec(body).map_err(|_| ApiError::decode(method, url.as_str()))?)
      }
      None => None,
    };

    let key = request_key(method, &url, body.as_deref());

    let response = {
      let mut in_flight = lock(&self.inner.in_flight);
      match in_flight.get(&key) {
        Some(existing) => {
          debug!(
            key = %key,
            age_ms = existing.started_at.elapsed().as_millis() as u64,
            "Joining in-flight request"
          );
          existing.response.clone()
        }
        None => {
          let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
          let response = self.dispatch(id, key.clone(), method, url, body);
          in_flight.insert(
            key,
            InFlightRequest {
              id,
              method,
              path: path.to_string(),
              response: response.clone(),
              started_at: Instant::now(),
            },
          );
          response
        }
      }
    };

    response.await
  }

  /// GET `path` and decode the body as `T`.
  pub async fn get_json<T: DeserializeOwned>(&self, path: &str, params: Params) -> Result<T, ApiError> {
    let response = self
      .request(Method::Get, path, RequestConfig::params(params))
      .await?;
    decode_body(Method::Get, path, response.body)
  }

  /// Send `body` as JSON and decode the response as `T`.
  pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    let body = serde_json::to_value(body).map_err(|_| ApiError::decode(method, path))?;
    let response = self
      .request(method, path, RequestConfig::body(body))
      .await?;
    decode_body(method, path, response.body)
  }

  fn build_url(&self, path: &str, params: &Params) -> Option<Url> {
    let separator = if path.starts_with('/') { "" } else { "/" };
    let mut url = Url::parse(&format!("{}{}{}", self.inner.base_url, separator, path)).ok()?;

    let pairs: Vec<(String, &str)> = params
      .iter()
      .filter(|(_, value)| !value.is_blank())
      .flat_map(|(key, value)| {
        let name = match value {
          ParamValue::Many(_) => format!("{}[]", key),
          ParamValue::Single(_) => key.clone(),
        };
        value
          .values()
          .into_iter()
          .filter(|v| !v.trim().is_empty())
          .map(move |v| (name.clone(), v))
      })
      .collect();

    if !pairs.is_empty() {
      url.query_pairs_mut().extend_pairs(pairs);
    }
    Some(url)
  }

  fn dispatch(
    &self,
    id: u64,
    key: String,
    method: Method,
    url: Url,
    body: Option<Vec<u8>>,
  ) -> SharedResponse {
    let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
    if body.is_some() {
      headers.push(("Content-Type".to_string(), "application/json".to_string()));
    }
    if let Some(token) = self.inner.tokens.token() {
      headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
    }

    debug!(method = %method, url = %url, "Dispatching request");

    let send = self.inner.transport.send(HttpRequest {
      method,
      url: url.clone(),
      headers,
      body,
    });
    let timeout = self.inner.timeout;
    let registry = Arc::downgrade(&self.inner);

    async move {
      let outcome = tokio::time::timeout(timeout, send).await;

      // Settled either way: later calls for this key go to the network again.
      // A detached call must not evict the newer call now holding its key.
      if let Some(inner) = registry.upgrade() {
        let mut in_flight = lock(&inner.in_flight);
        if in_flight.get(&key).map(|request| request.id) == Some(id) {
          in_flight.remove(&key);
        }
      }

      let result = match outcome {
        Err(_) => Err(ApiError::timeout(method, url.as_str())),
        Ok(Err(err)) => Err(ApiError::from_transport(method, url.as_str(), &err)),
        Ok(Ok(response)) => into_api_response(method, &url, response),
      };

      if let Err(err) = &result {
        warn!(
          method = %method,
          url = %url,
          status = ?err.status,
          kind = ?err.kind,
          "Request failed: {}",
          err.message
        );
      }
      result
    }
    .boxed()
    .shared()
  }
}

fn into_api_response(method: Method, url: &Url, response: HttpResponse) -> Result<ApiResponse, ApiError> {
  let success = (200..300).contains(&response.status);

  let body = if response.body.iter().all(u8::is_ascii_whitespace) {
    Value::Null
  } else {
    match serde_json::from_slice(&response.body) {
      Ok(body) => body,
      Err(_) if success => return Err(ApiError::decode(method, url.as_str())),
      Err(_) => Value::Null,
    }
  };

  if success {
    Ok(ApiResponse {
      status: response.status,
      body,
    })
  } else {
    Err(ApiError::from_response(method, url.as_str(), response.status, &body))
  }
}

fn decode_body<T: DeserializeOwned>(method: Method, path: &str, body: Value) -> Result<T, ApiError> {
  serde_json::from_value(body).map_err(|_| ApiError::decode(method, path))
}

/// Identity of a call for deduplication: method, URL with its (sorted)
/// query, and a digest of the body if there is one.
fn request_key(method: Method, url: &Url, body: Option<&[u8]>) -> String {
  match body {
    Some(body) => {
      let digest = hex::encode(Sha256::digest(body));
      format!("{} {} #{}", method, url, &digest[..16])
    }
    None => format!("{} {}", method, url),
  }
}
