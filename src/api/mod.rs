//! Request transport adapter for the admin API.
//!
//! - [`ApiClient`] issues calls with token injection, a client-side timeout,
//!   error normalization and in-flight deduplication
//! - [`HttpTransport`] is the seam to the actual HTTP stack
//! - [`ApiError`] is the only error shape callers ever see

mod auth;
mod client;
mod error;
mod transport;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{EnvToken, NoToken, StaticToken, TokenProvider};
pub use client::{ApiClient, ApiResponse, RequestConfig};
pub use error::{ApiError, ApiErrorKind};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
pub use types::{
  Method, MutationResponse, PageLink, PaginationMeta, ParamValue, Params, RawPage,
  ValidationErrors,
};
