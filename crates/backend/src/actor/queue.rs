//! Live queue and wake timer
//!
//! Files produced locally are pushed here and indexed ahead of the backlog.
//! The queue also owns the scheduler's wake timer: the timer being armed is
//! the only signal that the scheduler is asleep. Both live behind one lock so
//! that "queue is empty, go to sleep" and "item pushed, wake up" can never
//! interleave into a lost wakeup.
//!
//! Pop order is last-in-first-out: the most recently pushed file is indexed
//! first. The queue does not deduplicate.

use std::{
  sync::{Mutex, MutexGuard},
  time::Duration,
};

use tokio::{
  sync::{Notify, futures::Notified},
  time::Instant,
};
use tracing::trace;

use super::message::QueueItem;

/// An armed wake timer: the scheduler resumes at `deadline` unless woken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeTimer {
  pub deadline: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
  items: Vec<QueueItem>,
  timer: Option<WakeTimer>,
}

#[derive(Debug, Default)]
pub struct LiveQueue {
  state: Mutex<QueueState>,
  wake: Notify,
}

impl LiveQueue {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, QueueState> {
    // Queue state stays consistent even if a holder panicked
    self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Append an item. Does not wake the scheduler; see [`LiveQueue::wake`].
  pub fn push(&self, item: QueueItem) {
    let mut state = self.lock();
    state.items.push(item);
    trace!(queued = state.items.len(), "Live item queued");
  }

  /// Remove the most recently pushed item
  pub fn pop(&self) -> Option<QueueItem> {
    self.lock().items.pop()
  }

  /// Pop an item, or arm the wake timer if the queue is empty.
  ///
  /// The emptiness check and arming happen under one lock, so a push racing
  /// with this call is either popped here or wakes the armed timer.
  pub fn pop_or_arm(&self, idle: Duration) -> Option<QueueItem> {
    let mut state = self.lock();
    if let Some(item) = state.items.pop() {
      return Some(item);
    }
    state.timer = Some(WakeTimer {
      deadline: Instant::now() + idle,
    });
    None
  }

  /// Arm the wake timer regardless of queued items (error backoff)
  pub fn arm(&self, idle: Duration) {
    self.lock().timer = Some(WakeTimer {
      deadline: Instant::now() + idle,
    });
  }

  /// Cancel an armed timer and signal the scheduler.
  ///
  /// Returns whether the scheduler was asleep. A no-op while awake: the
  /// scheduler picks up new items on its next tick.
  pub fn wake(&self) -> bool {
    let was_asleep = self.lock().timer.take().is_some();
    if was_asleep {
      self.wake.notify_one();
    }
    was_asleep
  }

  /// Clear the timer after it fired. Returns false if a wake got there first.
  pub fn expire(&self) -> bool {
    self.lock().timer.take().is_some()
  }

  /// Future resolving when [`LiveQueue::wake`] signals the sleeping scheduler
  pub fn woken(&self) -> Notified<'_> {
    self.wake.notified()
  }

  pub fn timer(&self) -> Option<WakeTimer> {
    self.lock().timer
  }

  pub fn is_asleep(&self) -> bool {
    self.lock().timer.is_some()
  }

  /// Items waiting to be popped
  pub fn queued(&self) -> usize {
    self.lock().items.len()
  }
}
