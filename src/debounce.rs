//! Value debouncing for tick-driven UIs.
//!
//! A [`Debouncer`] holds a committed value and at most one pending value.
//! Every `set` restarts the pending deadline, so a burst of changes commits
//! once, with the last value, after the input has been quiet for the delay.

use std::time::Duration;
use tokio::time::Instant;

/// Default quiet period before a change is committed.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
struct Pending<T> {
  value: T,
  deadline: Instant,
}

/// Debounced value.
///
/// Poll it from the event loop tick, or await [`Debouncer::settled`].
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
  value: T,
  pending: Option<Pending<T>>,
  delay: Duration,
}

impl<T: PartialEq> Debouncer<T> {
  pub fn new(initial: T, delay: Duration) -> Self {
    Self {
      value: initial,
      pending: None,
      delay,
    }
  }

  /// The last committed value.
  pub fn value(&self) -> &T {
    &self.value
  }

  /// Whether a change is waiting for its deadline.
  pub fn pending(&self) -> bool {
    self.pending.is_some()
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.pending.as_ref().map(|p| p.deadline)
  }

  /// Record a new input value, restarting the quiet period.
  pub fn set(&mut self, value: T) {
    if self.pending.is_none() && value == self.value {
      return;
    }
    self.pending = Some(Pending {
      value,
      deadline: Instant::now() + self.delay,
    });
  }

  /// Commit the pending value if its deadline has passed.
  ///
  /// Returns `true` when a new value was committed.
  pub fn poll(&mut self) -> bool {
    match &self.pending {
      Some(pending) if Instant::now() >= pending.deadline => {}
      _ => return false,
    }

    self.flush()
  }

  /// Wait for the pending value (if any) to commit.
  pub async fn settled(&mut self) -> bool {
    match self.deadline() {
      Some(deadline) => {
        tokio::time::sleep_until(deadline).await;
        self.poll()
      }
      None => false,
    }
  }

  /// Commit the pending value now, without waiting for its deadline.
  ///
  /// A pending value equal to the committed one is dropped and does not
  /// count as a change.
  pub fn flush(&mut self) -> bool {
    match self.pending.take() {
      Some(pending) if pending.value != self.value => {
        self.value = pending.value;
        true
      }
      _ => false,
    }
  }

  /// Drop the pending value without committing it.
  pub fn cancel(&mut self) {
    self.pending = None;
  }
}
