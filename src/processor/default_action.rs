// src/processor/default_action.rs

use crate::error::{ActionResult, MailboxError};
use crate::mail::{Mail, MailOptions, MIN_PRIORITY};

use super::MailboxControl;

/// Work the processor performs whenever no mail is pending, typically
/// processing the next input record.
///
/// Each call should do a bounded amount of work and return. A returned error
/// is fatal for the task.
pub trait DefaultAction {
  fn run_default_action(&mut self, controller: &mut DefaultActionController) -> ActionResult;
}

impl<F> DefaultAction for F
where
  F: FnMut(&mut DefaultActionController) -> ActionResult,
{
  fn run_default_action(&mut self, controller: &mut DefaultActionController) -> ActionResult {
    self(controller)
  }
}

/// Handed to the [`DefaultAction`] so it can steer the mailbox loop.
#[derive(Debug)]
pub struct DefaultActionController {
  control: MailboxControl,
}

impl DefaultActionController {
  pub(crate) fn new(control: MailboxControl) -> Self {
    Self { control }
  }

  /// Stops calling the default action until the returned [`Suspension`] is
  /// resumed. The loop keeps processing mail in the meantime.
  pub fn suspend_default_action(&mut self) -> Suspension {
    self.control.shared.set_suspended(true);
    tracing::trace!("Default action suspended");
    Suspension {
      control: self.control.clone(),
    }
  }

  /// Signals that there is no more default work. The processor stops calling
  /// the default action, drains the remaining mail and closes.
  pub fn all_actions_completed(&mut self) {
    self.control.quiesce();
  }
}

/// Token for resuming a suspended default action. Cloneable and usable from
/// any thread, e.g. by the component that makes new input available.
#[derive(Debug, Clone)]
pub struct Suspension {
  control: MailboxControl,
}

impl Suspension {
  /// Re-enables the default action. Resuming twice is harmless.
  ///
  /// From a foreign thread this enqueues an urgent no-op mail so a mailbox
  /// thread blocked waiting for mail wakes up and notices.
  pub fn resume(&self) {
    if !self.control.shared.set_suspended(false) {
      return;
    }
    tracing::trace!("Default action resumed");
    if self.control.mailbox.is_mailbox_thread() {
      return;
    }
    let wakeup = Mail::new(MailOptions::urgent(), MIN_PRIORITY, "resume default action", || Ok(()));
    match self.control.mailbox.put(wakeup) {
      Ok(()) => {}
      Err(MailboxError::Closed) | Err(MailboxError::Rejected(_)) => {
        tracing::trace!("Mailbox no longer accepts mail; resume wakeup dropped");
      }
      Err(other) => tracing::warn!(error = %other, "Failed to wake mailbox thread for resume"),
    }
  }

  pub fn is_suspended(&self) -> bool {
    self.control.shared.is_suspended()
  }
}
