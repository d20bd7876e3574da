//! The HTTP transport seam.
//!
//! The adapter only needs "send this request, give me status and body".
//! `ReqwestTransport` is the real implementation; tests plug in a scripted one.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::types::Method;

/// A fully built outbound request
#[derive(Debug, Clone)]
pub struct HttpRequest {
  pub method: Method,
  pub url: Url,
  pub headers: Vec<(String, String)>,
  pub body: Option<Vec<u8>>,
}

impl HttpRequest {
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// Any HTTP response, successful or not
#[derive(Debug, Clone)]
pub struct HttpResponse {
  pub status: u16,
  pub body: Vec<u8>,
}

/// Failure below the HTTP layer
#[derive(Debug, Clone, Error)]
pub enum TransportError {
  #[error("request timed out")]
  Timeout,
  #[error("connection failed: {0}")]
  Connect(String),
  #[error("transport error: {0}")]
  Other(String),
}

/// Sends requests; every HTTP status is a successful send.
pub trait HttpTransport: Send + Sync {
  fn send(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, TransportError>>;
}

/// Transport backed by a shared `reqwest::Client`
#[derive(Clone)]
pub struct ReqwestTransport {
  client: reqwest::Client,
}

impl ReqwestTransport {
  pub fn new(timeout: Duration) -> Result<Self, TransportError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| TransportError::Other(e.to_string()))?;

    Ok(Self { client })
  }
}

impl HttpTransport for ReqwestTransport {
  fn send(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, TransportError>> {
    let client = self.client.clone();

    async move {
      let method = match request.method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
      };

      let mut builder = client.request(method, request.url);
      for (name, value) in request.headers {
        builder = builder.header(name, value);
      }
      if let Some(body) = request.body {
        builder = builder.body(body);
      }

      let response = builder.send().await.map_err(classify)?;
      let status = response.status().as_u16();
      let body = response.bytes().await.map_err(classify)?.to_vec();

      Ok(HttpResponse { status, body })
    }
    .boxed()
  }
}

fn classify(err: reqwest::Error) -> TransportError {
  if err.is_timeout() {
    TransportError::Timeout
  } else if err.is_connect() {
    TransportError::Connect(err.to_string())
  } else {
    TransportError::Other(err.to_string())
  }
}
