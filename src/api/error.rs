//! Normalized API errors.
//!
//! Every failure leaving the transport adapter has the same shape: a kind,
//! the HTTP status if there was one, a user-facing message, and where it
//! happened. Raw transport errors never cross the adapter boundary.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use super::transport::TransportError;
use super::types::{Method, ValidationErrors};

/// Category of a failed API call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
  /// 400
  BadRequest,
  /// 401
  Unauthenticated,
  /// 403
  Forbidden,
  /// 404
  NotFound,
  /// 422 with field-level errors
  Validation,
  /// 429
  RateLimited,
  /// 5xx
  Server,
  /// No response within the client-side timeout
  Timeout,
  /// No response at all (connection refused, DNS, TLS)
  Network,
  /// Response body did not match the expected shape
  Decode,
  /// Mutation envelope reported `success: false`
  Rejected,
  /// Request could not be built
  InvalidUrl,
  /// Any other non-success status
  Http,
}

impl ApiErrorKind {
  pub fn from_status(status: u16) -> Self {
    match status {
      400 => ApiErrorKind::BadRequest,
      401 => ApiErrorKind::Unauthenticated,
      403 => ApiErrorKind::Forbidden,
      404 => ApiErrorKind::NotFound,
      422 => ApiErrorKind::Validation,
      429 => ApiErrorKind::RateLimited,
      500..=599 => ApiErrorKind::Server,
      _ => ApiErrorKind::Http,
    }
  }

  /// Message shown when the server does not supply one
  pub fn default_message(&self) -> &'static str {
    match self {
      ApiErrorKind::BadRequest => "The submitted data is invalid.",
      ApiErrorKind::Unauthenticated => "Your session has expired. Please sign in again.",
      ApiErrorKind::Forbidden => "You do not have permission to perform this action.",
      ApiErrorKind::NotFound => "The requested resource was not found.",
      ApiErrorKind::Validation => "The submitted data failed validation.",
      ApiErrorKind::RateLimited => "Too many requests. Please wait a moment and try again.",
      ApiErrorKind::Server => "The server encountered an error. Please try again later.",
      ApiErrorKind::Timeout => "The request timed out. Check your connection and try again.",
      ApiErrorKind::Network => "Unable to reach the server. Check your network connection.",
      ApiErrorKind::Decode => "The server returned an unexpected response.",
      ApiErrorKind::Rejected => "The server rejected the request.",
      ApiErrorKind::InvalidUrl => "The request URL is invalid.",
      ApiErrorKind::Http => "The request failed.",
    }
  }
}

/// A failed API call in its user-presentable form
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
  pub kind: ApiErrorKind,
  pub status: Option<u16>,
  pub message: String,
  pub method: Method,
  pub url: String,
  pub timestamp: DateTime<Utc>,
  /// Field-level messages, only populated for `Validation`
  pub validation: ValidationErrors,
}

impl ApiError {
  fn new(kind: ApiErrorKind, method: Method, url: impl Into<String>) -> Self {
    Self {
      kind,
      status: None,
      message: kind.default_message().to_string(),
      method,
      url: url.into(),
      timestamp: Utc::now(),
      validation: ValidationErrors::new(),
    }
  }

  /// Error for a non-success HTTP status; a server `message` wins over the
  /// status table.
  pub fn from_response(method: Method, url: impl Into<String>, status: u16, body: &Value) -> Self {
    let kind = ApiErrorKind::from_status(status);
    let mut error = Self::new(kind, method, url);
    error.status = Some(status);

    if let Some(message) = body
      .get("message")
      .and_then(Value::as_str)
      .filter(|m| !m.trim().is_empty())
    {
      error.message = message.to_string();
    }

    if kind == ApiErrorKind::Validation {
      error.validation = parse_validation_errors(body);
    }

    error
  }

  pub fn from_transport(method: Method, url: impl Into<String>, err: &TransportError) -> Self {
    match err {
      TransportError::Timeout => Self::timeout(method, url),
      TransportError::Connect(_) | TransportError::Other(_) => {
        Self::new(ApiErrorKind::Network, method, url)
      }
    }
  }

  pub fn timeout(method: Method, url: impl Into<String>) -> Self {
    Self::new(ApiErrorKind::Timeout, method, url)
  }

  pub fn decode(method: Method, url: impl Into<String>) -> Self {
    Self::new(ApiErrorKind::Decode, method, url)
  }

  pub fn invalid_url(method: Method, url: impl Into<String>) -> Self {
    Self::new(ApiErrorKind::InvalidUrl, method, url)
  }

  pub fn rejected(method: Method, url: impl Into<String>, message: Option<String>) -> Self {
    let mut error = Self::new(ApiErrorKind::Rejected, method, url);
    if let Some(message) = message.filter(|m| !m.trim().is_empty()) {
      error.message = message;
    }
    error
  }

  pub fn is_validation(&self) -> bool {
    self.kind == ApiErrorKind::Validation
  }

  pub fn is_auth(&self) -> bool {
    matches!(
      self.kind,
      ApiErrorKind::Unauthenticated | ApiErrorKind::Forbidden
    )
  }

  /// Whether repeating the same request could plausibly succeed
  pub fn is_retryable(&self) -> bool {
    matches!(
      self.kind,
      ApiErrorKind::Timeout | ApiErrorKind::Network | ApiErrorKind::Server
    )
  }
}

/// Read `{ "errors": { field: [messages] } }`, tolerating single-string values.
fn parse_validation_errors(body: &Value) -> ValidationErrors {
  let Some(errors) = body.get("errors").and_then(Value::as_object) else {
    return ValidationErrors::new();
  };

  errors
    .iter()
    .map(|(field, messages)| {
      let messages = match messages {
        Value::Array(items) => items
          .iter()
          .filter_map(Value::as_str)
          .map(String::from)
          .collect(),
        Value::String(message) => vec![message.clone()],
        _ => Vec::new(),
      };
      (field.clone(), messages)
    })
    .collect()
}
