//! Create, update and delete on top of a list view.
//!
//! A `CrudController` wraps a [`ListController`] and adds the state a CRUD
//! screen needs around it: which modal is open, per-field validation errors,
//! a submitting flag and the current selection. Every successful mutation
//! drops the list's cached pages and refetches the current page.

use futures::future::join_all;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::api::{ApiClient, ApiError, Method, MutationResponse, RequestConfig, ValidationErrors};
use crate::list::{ListController, ListItem};
use crate::lock;

/// Items with a numeric primary key
pub trait Identifiable {
  fn item_id(&self) -> u64;
}

/// Which dialog of the screen is open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalState {
  Closed,
  Create,
  Edit(u64),
  ConfirmDelete(Vec<u64>),
}

struct CrudState {
  modal: ModalState,
  form_errors: ValidationErrors,
  submitting: bool,
  selected: Vec<u64>,
}

pub struct CrudController<T> {
  list: ListController<T>,
  state: Arc<Mutex<CrudState>>,
}

impl<T> Clone for CrudController<T> {
  fn clone(&self) -> Self {
    Self {
      list: self.list.clone(),
      state: Arc::clone(&self.state),
    }
  }
}

impl<T: ListItem + Identifiable> CrudController<T> {
  pub fn new(list: ListController<T>) -> Self {
    Self {
      list,
      state: Arc::new(Mutex::new(CrudState {
        modal: ModalState::Closed,
        form_errors: ValidationErrors::new(),
        submitting: false,
        selected: Vec::new(),
      })),
    }
  }

  pub fn list(&self) -> &ListController<T> {
    &self.list
  }

  pub fn modal(&self) -> ModalState {
    lock(&self.state).modal.clone()
  }

  pub fn form_errors(&self) -> ValidationErrors {
    lock(&self.state).form_errors.clone()
  }

  /// First validation message for `field`
  pub fn field_error(&self, field: &str) -> Option<String> {
    lock(&self.state)
      .form_errors
      .get(field)
      .and_then(|messages| messages.first().cloned())
  }

  pub fn is_submitting(&self) -> bool {
    lock(&self.state).submitting
  }

  pub fn open_create(&self) {
    self.set_modal(ModalState::Create);
  }

  pub fn open_edit(&self, id: u64) {
    self.set_modal(ModalState::Edit(id));
  }

  pub fn confirm_delete(&self, ids: Vec<u64>) {
    self.set_modal(ModalState::ConfirmDelete(ids));
  }

  pub fn close_modal(&self) {
    self.set_modal(ModalState::Closed);
  }

  fn set_modal(&self, modal: ModalState) {
    let mut state = lock(&self.state);
    state.modal = modal;
    state.form_errors.clear();
  }

  pub fn selected_items(&self) -> Vec<u64> {
    lock(&self.state).selected.clone()
  }

  pub fn is_selected(&self, id: u64) -> bool {
    lock(&self.state).selected.contains(&id)
  }

  pub fn toggle_selection(&self, id: u64) {
    let mut state = lock(&self.state);
    match state.selected.iter().position(|selected| *selected == id) {
      Some(index) => {
        state.selected.remove(index);
      }
      None => state.selected.push(id),
    }
  }

  /// Select every item on the page, or clear the selection when it is
  /// already as long as the page.
  pub fn toggle_select_all(&self) {
    let ids: Vec<u64> = self.list.items().iter().map(Identifiable::item_id).collect();
    let mut state = lock(&self.state);
    if state.selected.len() == ids.len() {
      state.selected.clear();
    } else {
      state.selected = ids;
    }
  }

  pub fn clear_selection(&self) {
    lock(&self.state).selected.clear();
  }

  /// POST a new item to the list endpoint.
  pub async fn create_item(&self, payload: Value) -> Result<MutationResponse, ApiError> {
    let payload = self.list.hooks().before_submit(payload);
    let path = self.list.endpoint().to_string();
    self.submit(Method::Post, &path, Some(payload)).await
  }

  /// PUT changes to an existing item.
  pub async fn update_item(&self, id: u64, payload: Value) -> Result<MutationResponse, ApiError> {
    let payload = self.list.hooks().before_submit(payload);
    let path = self.item_path(id);
    self.submit(Method::Put, &path, Some(payload)).await
  }

  pub async fn delete_item(&self, id: u64) -> Result<MutationResponse, ApiError> {
    let path = self.item_path(id);
    let response = self.submit(Method::Delete, &path, None).await?;
    lock(&self.state).selected.retain(|selected| *selected != id);
    self.step_back_if_empty().await;
    Ok(response)
  }

  /// Delete every selected item concurrently.
  ///
  /// Deleted ids leave the selection; the first failure is returned after
  /// the list has been refreshed.
  pub async fn delete_selected_items(&self) -> Result<usize, ApiError> {
    let ids = self.selected_items();
    if ids.is_empty() {
      return Ok(0);
    }

    lock(&self.state).submitting = true;
    let client = self.list.coordinator().client().clone();
    let results = join_all(ids.iter().map(|id| {
      let client = client.clone();
      let path = self.item_path(*id);
      async move { mutation(&client, Method::Delete, &path, None).await }
    }))
    .await;

    let mut deleted = Vec::new();
    let mut first_error = None;
    for (id, result) in ids.into_iter().zip(results) {
      match result {
        Ok(_) => deleted.push(id),
        Err(err) => {
          first_error.get_or_insert(err);
        }
      }
    }
    info!(
      endpoint = %self.list.endpoint(),
      deleted = deleted.len(),
      failed = first_error.is_some(),
      "Bulk delete finished"
    );

    {
      let mut state = lock(&self.state);
      state.submitting = false;
      state.selected.retain(|id| !deleted.contains(id));
      if first_error.is_none() {
        state.modal = ModalState::Closed;
      }
    }
    if !deleted.is_empty() {
      self.reload().await;
      self.step_back_if_empty().await;
    }

    match first_error {
      Some(err) => Err(err),
      None => Ok(deleted.len()),
    }
  }

  fn item_path(&self, id: u64) -> String {
    format!("{}/{}", self.list.endpoint().trim_end_matches('/'), id)
  }

  async fn submit(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
  ) -> Result<MutationResponse, ApiError> {
    {
      let mut state = lock(&self.state);
      state.submitting = true;
      state.form_errors.clear();
    }

    let client = self.list.coordinator().client().clone();
    let result = mutation(&client, method, path, body).await;

    {
      let mut state = lock(&self.state);
      state.submitting = false;
      match &result {
        Ok(_) => state.modal = ModalState::Closed,
        Err(err) if err.is_validation() => {
          debug!(fields = err.validation.len(), "Mutation failed validation");
          state.form_errors = err.validation.clone();
        }
        Err(_) => {}
      }
    }

    if result.is_ok() {
      self.reload().await;
    }
    result
  }

  /// Drop the list's cached pages and fetch the current page again.
  async fn reload(&self) {
    self.list.invalidate_cache();
    // Failures are recorded in the list state
    let _ = self.list.fetch_data(None).await;
  }

  /// After a delete, go back one page if the current one is now empty.
  async fn step_back_if_empty(&self) {
    let page = self.list.page().current_page;
    if page > 1 && self.list.items().is_empty() {
      self.list.change_page(i64::from(page) - 1).await;
    }
  }
}

/// Send one mutation and unwrap its `{success, data, message}` envelope.
async fn mutation(
  client: &ApiClient,
  method: Method,
  path: &str,
  body: Option<Value>,
) -> Result<MutationResponse, ApiError> {
  let config = RequestConfig {
    body,
    ..RequestConfig::default()
  };
  let response = client.request(method, path, config).await?;

  let envelope = match response.body {
    Value::Null => MutationResponse {
      success: true,
      data: None,
      message: None,
    },
    body => serde_json::from_value::<MutationResponse>(body)
      .map_err(|_| ApiError::decode(method, path))?,
  };

  if !envelope.success {
    return Err(ApiError::rejected(method, path, envelope.message));
  }
  Ok(envelope)
}
