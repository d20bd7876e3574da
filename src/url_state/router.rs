//! Router abstraction and an in-memory implementation with history.

use std::sync::Mutex;
use tokio::sync::watch;
use tracing::trace;

use super::location::Location;
use crate::lock;

/// How a navigation is recorded in history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationMode {
  /// Add a history entry
  Push,
  /// Overwrite the current history entry
  Replace,
}

/// The host router a list view lives in.
pub trait Router: Send + Sync {
  fn location(&self) -> Location;

  fn navigate(&self, location: Location, mode: NavigationMode);

  /// Receiver that is notified after every navigation, including back and
  /// forward.
  fn subscribe(&self) -> watch::Receiver<Location>;
}

struct History {
  entries: Vec<Location>,
  index: usize,
  navigations: usize,
}

/// Router keeping its history in memory, used by the CLI and in tests.
pub struct MemoryRouter {
  history: Mutex<History>,
  notify: watch::Sender<Location>,
}

impl MemoryRouter {
  pub fn new(initial: impl Into<Location>) -> Self {
    let initial = initial.into();
    let (notify, _) = watch::channel(initial.clone());
    Self {
      history: Mutex::new(History {
        entries: vec![initial],
        index: 0,
        navigations: 0,
      }),
      notify,
    }
  }

  /// Follow a link: a new history entry for another path, a replaced entry
  /// for a query change on the same path.
  pub fn push(&self, location: impl Into<Location>) {
    let location = location.into();
    let mode = if location.path == self.location().path {
      NavigationMode::Replace
    } else {
      NavigationMode::Push
    };
    self.navigate(location, mode);
  }

  /// Step back one entry; false at the start of history.
  pub fn back(&self) -> bool {
    self.step(-1)
  }

  /// Step forward one entry; false at the end of history.
  pub fn forward(&self) -> bool {
    self.step(1)
  }

  pub fn history_len(&self) -> usize {
    lock(&self.history).entries.len()
  }

  /// Number of `navigate` calls so far.
  pub fn navigations(&self) -> usize {
    lock(&self.history).navigations
  }

  fn step(&self, delta: isize) -> bool {
    let location = {
      let mut history = lock(&self.history);
      let target = history.index as isize + delta;
      if target < 0 || target as usize >= history.entries.len() {
        return false;
      }
      history.index = target as usize;
      history.entries[history.index].clone()
    };
    self.notify.send_replace(location);
    true
  }
}

impl Router for MemoryRouter {
  fn location(&self) -> Location {
    let history = lock(&self.history);
    history.entries[history.index].clone()
  }

  fn navigate(&self, location: Location, mode: NavigationMode) {
    {
      let mut history = lock(&self.history);
      history.navigations += 1;
      match mode {
        NavigationMode::Push => {
          let keep = history.index + 1;
          history.entries.truncate(keep);
          history.entries.push(location.clone());
          history.index = keep;
        }
        NavigationMode::Replace => {
          let index = history.index;
          history.entries[index] = location.clone();
        }
      }
    }
    trace!(%location, ?mode, "Navigated");
    self.notify.send_replace(location);
  }

  fn subscribe(&self) -> watch::Receiver<Location> {
    self.notify.subscribe()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_replace_keeps_history_length() {
    let router = MemoryRouter::new("/admin/users");
    router.navigate(Location::from("/admin/users?page=2"), NavigationMode::Replace);
    assert_eq!(router.history_len(), 1);
    assert_eq!(router.location().get("page"), Some("2"));
    assert!(!router.back());
  }

  #[test]
  fn test_push_replaces_on_same_path() {
    let router = MemoryRouter::new("/admin/users");
    router.push("/admin/users?page=2");
    assert_eq!(router.history_len(), 1);
    router.push("/admin/orders");
    assert_eq!(router.history_len(), 2);
  }

  #[test]
  fn test_push_back_and_forward() {
    let router = MemoryRouter::new("/admin/users");
    router.push("/admin/products");
    router.push("/admin/orders");
    assert!(router.back());
    assert_eq!(router.location().path, "/admin/products");

    // Pushing drops the forward entries
    router.push("/admin/posts");
    assert!(!router.forward());
    assert_eq!(router.history_len(), 3);
    assert_eq!(router.navigations(), 3);
  }

  #[tokio::test]
  async fn test_subscribers_see_navigation() {
    let router = MemoryRouter::new("/admin/users");
    let mut rx = router.subscribe();
    router.navigate(Location::from("/admin/users?page=3"), NavigationMode::Push);
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().get("page"), Some("3"));

    assert!(router.back());
    rx.changed().await.unwrap();
    assert!(rx.borrow().query.is_empty());
  }
}
