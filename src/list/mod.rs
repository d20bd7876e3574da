//! List view state: filters, sort, pagination and the controller that keeps
//! them in sync with the URL and the server.

mod controller;
mod hooks;
mod options;
mod state;

pub use controller::{ListController, ListControllerBuilder, ListItem};
pub use hooks::{IdentityHooks, ListHooks};
pub use options::ListOptions;
pub use state::{
  FilterState, FilterValue, ListPage, ListQuery, ListViewState, PaginationState, QueryKeys,
  SortOrder, SortState,
};
