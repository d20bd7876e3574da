//! Keeping list state in the address bar.
//!
//! The router is abstract so the list controller can be driven by a browser
//! shell, the CLI or tests alike. [`MemoryRouter`] is the in-process one.

mod location;
mod mirror;
mod router;

pub use location::{Location, QueryMap};
pub use mirror::{RouteChange, UrlStateMirror};
pub use router::{MemoryRouter, NavigationMode, Router};
