// src/interrupt.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative interruption signal shared by every executor of a task.
///
/// Raised from outside the mailbox thread (a checkpoint trigger, a timer
/// service) and polled by long-running operator code through
/// [`MailboxExecutor::should_interrupt`](crate::executor::MailboxExecutor::should_interrupt).
/// It is independent of what is queued in the mailbox.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
  raised: Arc<AtomicBool>,
}

impl InterruptFlag {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn raise(&self) {
    if !self.raised.swap(true, Ordering::AcqRel) {
      tracing::trace!("Interrupt flag raised");
    }
  }

  pub fn clear(&self) {
    self.raised.store(false, Ordering::Release);
  }

  /// Reads the flag without changing it.
  pub fn is_raised(&self) -> bool {
    self.raised.load(Ordering::Acquire)
  }
}
