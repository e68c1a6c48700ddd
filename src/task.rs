//! Discardable handle for background work.
//!
//! Spawns a future on the tokio runtime and hands back a `Pending<T>`.
//! The caller can poll it from an event loop tick, await it, or simply drop
//! it when the result no longer matters; the spawned work still finishes and
//! its result is thrown away.
//!
//! # Example
//!
//! ```ignore
//! let mut pending = app.resolve_in_background("John 3:16");
//!
//! // In event loop tick
//! if let Some(resolution) = pending.poll() {
//!     render(resolution);
//! }
//! ```

use std::future::Future;
use tokio::sync::oneshot;

/// The state of a background task
#[derive(Debug)]
enum State<T> {
  Running(oneshot::Receiver<T>),
  Done,
}

/// Handle to a spawned future's result.
#[derive(Debug)]
pub struct Pending<T> {
  state: State<T>,
}

impl<T: Send + 'static> Pending<T> {
  /// Spawn `future` and return a handle to its result.
  pub fn spawn<Fut>(future: Fut) -> Self
  where
    Fut: Future<Output = T> + Send + 'static,
  {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      // Ignore send errors - handle may have been dropped
      let _ = tx.send(future.await);
    });

    Self {
      state: State::Running(rx),
    }
  }

  /// Check whether the result is still outstanding.
  pub fn is_pending(&self) -> bool {
    matches!(self.state, State::Running(_))
  }

  /// Take the result if it has arrived, without blocking.
  ///
  /// Returns `Some` at most once. A task that died without producing a
  /// result ends the handle with `None`.
  pub fn poll(&mut self) -> Option<T> {
    let rx = match &mut self.state {
      State::Running(rx) => rx,
      State::Done => return None,
    };

    match rx.try_recv() {
      Ok(value) => {
        self.state = State::Done;
        Some(value)
      }
      Err(oneshot::error::TryRecvError::Empty) => None,
      Err(oneshot::error::TryRecvError::Closed) => {
        self.state = State::Done;
        None
      }
    }
  }

  /// Wait for the result. `None` if it was already taken or the task died.
  pub async fn wait(self) -> Option<T> {
    match self.state {
      State::Running(rx) => rx.await.ok(),
      State::Done => None,
    }
  }
}
