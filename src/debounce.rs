//! Debounced function calls driven by the tokio timer queue.
//!
//! A [`Debounced`] wraps a function and delays its invocation until `wait`
//! has passed without another call. Repeated calls inside the window restart
//! the timer, `max_wait` bounds how long a continuous burst can postpone the
//! call. Pending calls can be cancelled or flushed.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::lock;

/// Edge and upper-bound behavior of a debounced function
#[derive(Debug, Clone, Copy)]
pub struct DebounceOptions {
  /// Invoke on the leading edge of a burst
  pub immediate: bool,
  /// Invoke on the trailing edge, after `wait` of silence
  pub trailing: bool,
  /// Longest a burst of calls may postpone the invocation
  pub max_wait: Option<Duration>,
}

impl Default for DebounceOptions {
  fn default() -> Self {
    Self {
      immediate: false,
      trailing: true,
      max_wait: None,
    }
  }
}

type DebouncedFn<A, R> = Arc<dyn Fn(A) -> R + Send + Sync>;

struct DebounceState<A, R> {
  pending_args: Option<A>,
  timer: Option<JoinHandle<()>>,
  burst_started: Option<Instant>,
  /// Bumped on every reschedule so superseded timers become no-ops
  generation: u64,
  last_result: Option<R>,
}

/// A function whose invocation is delayed until calls go quiet.
///
/// Clones share the same timer and pending arguments.
pub struct Debounced<A, R> {
  func: DebouncedFn<A, R>,
  state: Arc<Mutex<DebounceState<A, R>>>,
  wait: Duration,
  options: DebounceOptions,
}

impl<A, R> Clone for Debounced<A, R> {
  fn clone(&self) -> Self {
    Self {
      func: Arc::clone(&self.func),
      state: Arc::clone(&self.state),
      wait: self.wait,
      options: self.options,
    }
  }
}

impl<A, R> Debounced<A, R>
where
  A: Send + 'static,
  R: Clone + Send + 'static,
{
  /// Trailing-edge debounce with no `max_wait`.
  pub fn new<F>(func: F, wait: Duration) -> Self
  where
    F: Fn(A) -> R + Send + Sync + 'static,
  {
    Self::with_options(func, wait, DebounceOptions::default())
  }

  pub fn with_options<F>(func: F, wait: Duration, options: DebounceOptions) -> Self
  where
    F: Fn(A) -> R + Send + Sync + 'static,
  {
    Self {
      func: Arc::new(func),
      state: Arc::new(Mutex::new(DebounceState {
        pending_args: None,
        timer: None,
        burst_started: None,
        generation: 0,
        last_result: None,
      })),
      wait,
      options,
    }
  }

  /// Schedule an invocation with `args`, replacing any pending arguments.
  ///
  /// Must be called from within a tokio runtime.
  pub fn call(&self, args: A) {
    let now = Instant::now();

    let leading = {
      let mut state = lock(&self.state);
      let burst_started = *state.burst_started.get_or_insert(now);
      let leading = self.options.immediate && state.timer.is_none();

      if let Some(timer) = state.timer.take() {
        timer.abort();
      }
      state.generation += 1;

      let delay = match self.options.max_wait {
        Some(max_wait) => self
          .wait
          .min(max_wait.saturating_sub(now.duration_since(burst_started))),
        None => self.wait,
      };
      state.timer = Some(self.spawn_timer(delay, state.generation));

      if leading {
        Some(args)
      } else {
        state.pending_args = Some(args);
        None
      }
    };

    if let Some(args) = leading {
      self.invoke(args);
    }
  }

  /// Drop the pending invocation, if any.
  pub fn cancel(&self) {
    let mut state = lock(&self.state);
    if let Some(timer) = state.timer.take() {
      timer.abort();
    }
    state.generation += 1;
    state.pending_args = None;
    state.burst_started = None;
  }

  /// Run the pending invocation now and return its result.
  ///
  /// With nothing pending, returns the result of the last invocation
  /// without calling the function again.
  pub fn flush(&self) -> Option<R> {
    let args = {
      let mut state = lock(&self.state);
      if let Some(timer) = state.timer.take() {
        timer.abort();
      }
      state.generation += 1;
      state.burst_started = None;
      state.pending_args.take()
    };

    match args {
      Some(args) => Some(self.invoke(args)),
      None => lock(&self.state).last_result.clone(),
    }
  }

  /// Whether an invocation is waiting to run. A leading-edge call that
  /// already ran does not count, even while its burst window is open.
  pub fn pending(&self) -> bool {
    lock(&self.state).pending_args.is_some()
  }

  fn spawn_timer(&self, delay: Duration, generation: u64) -> JoinHandle<()> {
    let this = self.clone();
    tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      this.fire(generation);
    })
  }

  fn fire(&self, generation: u64) {
    let args = {
      let mut state = lock(&self.state);
      if state.generation != generation {
        return;
      }
      state.timer = None;
      state.burst_started = None;
      let args = state.pending_args.take();
      if self.options.trailing {
        args
      } else {
        None
      }
    };

    if let Some(args) = args {
      self.invoke(args);
    }
  }

  fn invoke(&self, args: A) -> R {
    let result = (self.func)(args);
    lock(&self.state).last_result = Some(result.clone());
    result
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(String) -> usize + Send + Sync) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let func = move |arg: String| {
      let mut calls = sink.lock().unwrap();
      calls.push(arg);
      calls.len()
    };
    (calls, func)
  }

  #[tokio::test(start_paused = true)]
  async fn test_burst_collapses_to_last_call() {
    let (calls, func) = recorder();
    let debounced = Debounced::new(func, Duration::from_millis(300));

    for text in ["j", "jo", "joh", "john"] {
      debounced.call(text.to_string());
      tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(calls.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(*calls.lock().unwrap(), vec!["john".to_string()]);
    assert!(!debounced.pending());
  }

  #[tokio::test(start_paused = true)]
  async fn test_cancel_drops_pending_call() {
    let (calls, func) = recorder();
    let debounced = Debounced::new(func, Duration::from_millis(300));

    debounced.call("a".to_string());
    assert!(debounced.pending());
    debounced.cancel();
    assert!(!debounced.pending());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(calls.lock().unwrap().is_empty());

    // Cancelling with nothing scheduled is harmless
    debounced.cancel();
  }

  #[tokio::test(start_paused = true)]
  async fn test_flush_runs_pending_call_immediately() {
    let (calls, func) = recorder();
    let debounced = Debounced::new(func, Duration::from_millis(300));

    debounced.call("first".to_string());
    assert_eq!(debounced.flush(), Some(1));
    assert_eq!(*calls.lock().unwrap(), vec!["first".to_string()]);

    // Nothing pending: last result, no new invocation
    assert_eq!(debounced.flush(), Some(1));
    assert_eq!(calls.lock().unwrap().len(), 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(calls.lock().unwrap().len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_flush_without_any_call_returns_none() {
    let (_calls, func) = recorder();
    let debounced = Debounced::new(func, Duration::from_millis(300));
    assert_eq!(debounced.flush(), None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_immediate_fires_on_leading_edge() {
    let (calls, func) = recorder();
    let options = DebounceOptions {
      immediate: true,
      ..DebounceOptions::default()
    };
    let debounced = Debounced::with_options(func, Duration::from_millis(300), options);

    debounced.call("lead".to_string());
    assert_eq!(*calls.lock().unwrap(), vec!["lead".to_string()]);
    assert!(!debounced.pending());

    // A lone leading call has no trailing invocation
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(calls.lock().unwrap().len(), 1);

    debounced.call("again".to_string());
    assert!(!debounced.pending());
    debounced.call("trail".to_string());
    assert!(debounced.pending());
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(
      *calls.lock().unwrap(),
      vec!["lead".to_string(), "again".to_string(), "trail".to_string()]
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_max_wait_forces_invocation() {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let options = DebounceOptions {
      max_wait: Some(Duration::from_millis(250)),
      ..DebounceOptions::default()
    };
    let debounced = Debounced::with_options(
      move |_: ()| counter.fetch_add(1, Ordering::SeqCst),
      Duration::from_millis(100),
      options,
    );

    // Calls every 50ms would starve a plain debounce forever
    for _ in 0..12 {
      debounced.call(());
      tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(count.load(Ordering::SeqCst) >= 2);
  }
}
