//! Scripted in-memory transport for tests.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::auth::{NoToken, TokenProvider};
use super::client::ApiClient;
use super::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

pub const BASE_URL: &str = "http://api.test";

/// Canned response with an optional delay before it is delivered
#[derive(Debug, Clone)]
pub struct FakeReply {
  status: u16,
  body: Vec<u8>,
  delay: Duration,
}

pub fn reply(status: u16, body: Value) -> FakeReply {
  FakeReply {
    status,
    body: serde_json::to_vec(&body).unwrap(),
    delay: Duration::ZERO,
  }
}

impl FakeReply {
  pub fn after_ms(mut self, millis: u64) -> Self {
    self.delay = Duration::from_millis(millis);
    self
  }

  pub fn raw(mut self, body: &str) -> Self {
    self.body = body.as_bytes().to_vec();
    self
  }
}

type Responder = Box<dyn Fn(&HttpRequest) -> Result<FakeReply, TransportError> + Send + Sync>;

/// Transport answering from a closure and recording every request
pub struct FakeTransport {
  responder: Responder,
  calls: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
  pub fn new<F>(responder: F) -> Arc<Self>
  where
    F: Fn(&HttpRequest) -> Result<FakeReply, TransportError> + Send + Sync + 'static,
  {
    Arc::new(Self {
      responder: Box::new(responder),
      calls: Mutex::new(Vec::new()),
    })
  }

  pub fn client(self: &Arc<Self>) -> ApiClient {
    self.client_with(Arc::new(NoToken))
  }

  pub fn client_with(self: &Arc<Self>, tokens: Arc<dyn TokenProvider>) -> ApiClient {
    ApiClient::new(
      BASE_URL,
      Arc::clone(self) as Arc<dyn HttpTransport>,
      tokens,
      Duration::from_secs(10),
    )
  }

  pub fn calls(&self) -> Vec<HttpRequest> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }
}

impl HttpTransport for FakeTransport {
  fn send(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, TransportError>> {
    let outcome = (self.responder)(&request);
    self.calls.lock().unwrap().push(request);

    async move {
      let reply = outcome?;
      tokio::time::sleep(reply.delay).await;
      Ok(HttpResponse {
        status: reply.status,
        body: reply.body,
      })
    }
    .boxed()
  }
}

/// Value of a query parameter on a recorded request
pub fn query_param(request: &HttpRequest, name: &str) -> Option<String> {
  request
    .url
    .query_pairs()
    .find(|(key, _)| key == name)
    .map(|(_, value)| value.into_owned())
}

/// A `{data, meta}` list body
pub fn list_body(items: Vec<Value>, current_page: u32, per_page: u32, total: u64) -> Value {
  let last_page = ((total + per_page as u64 - 1) / per_page as u64).max(1);
  json!({
    "data": items,
    "meta": {
      "current_page": current_page,
      "from": (current_page - 1) * per_page + 1,
      "to": (current_page - 1) * per_page + per_page,
      "total": total,
      "per_page": per_page,
      "last_page": last_page,
      "links": []
    }
  })
}
