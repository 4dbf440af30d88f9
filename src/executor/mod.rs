// src/executor/mod.rs

//! Producer-facing submission API and the mailbox-thread yield operations.

mod handle;

pub use handle::MailHandle;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{panic_message, ActionError, ActionResult, MailboxError};
use crate::interrupt::InterruptFlag;
use crate::mail::{Mail, MailAction, MailDescription, MailOptions};
use crate::mailbox::TaskMailbox;

/// Submits mail to a task mailbox and lets the mailbox thread yield to it.
///
/// Only [`execute_mail`](MailboxExecutor::execute_mail) and the yield
/// operations need implementing; the `execute`/`submit` conveniences all
/// funnel through `execute_mail`.
///
/// Errors from `execute`-style mail are not captured: they surface from
/// whichever call ends up running the mail (`yield_now`, `try_yield` or the
/// processor's main loop, where they are fatal for the task). Use
/// [`submit`](MailboxExecutor::submit) when the caller needs to observe the
/// failure instead.
pub trait MailboxExecutor {
  /// Enqueues a boxed action with explicit options. May block on a full mailbox.
  fn execute_mail(&self, options: MailOptions, action: MailAction, description: MailDescription) -> Result<(), MailboxError>;

  /// Runs one mail this executor may yield to, waiting for one if necessary.
  ///
  /// Mailbox thread only. Fails with [`MailboxError::Closed`] if the mailbox
  /// closes while waiting; an `execute`-style failure of the executed mail is
  /// returned to the caller.
  fn yield_now(&self) -> Result<(), MailboxError>;

  /// Runs one eligible mail if there is one. Never blocks.
  ///
  /// Mailbox thread only. Returns `Ok(false)` when nothing is eligible and
  /// [`MailboxError::Closed`] when the mailbox is closed.
  fn try_yield(&self) -> Result<bool, MailboxError>;

  /// Whether long-running work on the mailbox thread should stop at the next
  /// convenient point.
  fn should_interrupt(&self) -> bool;

  /// Enqueues `action` with default options.
  fn execute<F>(&self, action: F, description: impl Into<MailDescription>) -> Result<(), MailboxError>
  where
    F: FnOnce() -> ActionResult + Send + 'static,
    Self: Sized,
  {
    self.execute_mail(MailOptions::options(), Box::new(action), description.into())
  }

  /// Enqueues `action` with the given options.
  fn execute_with_options<F>(
    &self,
    options: MailOptions,
    action: F,
    description: impl Into<MailDescription>,
  ) -> Result<(), MailboxError>
  where
    F: FnOnce() -> ActionResult + Send + 'static,
    Self: Sized,
  {
    self.execute_mail(options, Box::new(action), description.into())
  }

  /// Enqueues `action` and returns a handle for its outcome.
  ///
  /// Failures and panics of `action` resolve the handle and never reach the
  /// mailbox loop. If the mail is discarded because the mailbox closes, the
  /// handle resolves with [`MailboxError::Closed`].
  fn submit<T, F>(&self, action: F, description: impl Into<MailDescription>) -> Result<MailHandle<T>, MailboxError>
  where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ActionError> + Send + 'static,
    Self: Sized,
  {
    let description = description.into();
    let failure_description = description.clone();
    let (completion, mail_handle) = handle::completion_pair();

    let wrapped = move || -> ActionResult {
      if completion.is_cancelled() {
        tracing::trace!(mail = %failure_description, "Skipping cancelled mail");
        return Ok(());
      }
      let outcome = match panic::catch_unwind(AssertUnwindSafe(action)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(MailboxError::action_failed(&failure_description, source)),
        Err(payload) => Err(MailboxError::ActionPanicked {
          description: failure_description.to_string(),
          message: panic_message(payload.as_ref()),
        }),
      };
      completion.complete(outcome);
      Ok(())
    };

    self.execute_mail(MailOptions::options(), Box::new(wrapped), description)?;
    Ok(mail_handle)
  }
}

/// [`MailboxExecutor`] bound to one [`TaskMailbox`] and one priority.
///
/// The priority reflects the submitter's position in the task's topology and
/// stays fixed for the executor's lifetime. Every mail it enqueues carries it,
/// and its yields only run mail with at least this priority.
#[derive(Debug, Clone)]
pub struct TaskMailboxExecutor {
  mailbox: Arc<TaskMailbox>,
  priority: i32,
  interrupt: InterruptFlag,
}

impl TaskMailboxExecutor {
  pub fn new(mailbox: Arc<TaskMailbox>, priority: i32, interrupt: InterruptFlag) -> Self {
    Self {
      mailbox,
      priority,
      interrupt,
    }
  }

  pub fn priority(&self) -> i32 {
    self.priority
  }

  pub fn mailbox(&self) -> &Arc<TaskMailbox> {
    &self.mailbox
  }

  pub fn is_mailbox_thread(&self) -> bool {
    self.mailbox.is_mailbox_thread()
  }
}

impl MailboxExecutor for TaskMailboxExecutor {
  fn execute_mail(&self, options: MailOptions, action: MailAction, description: MailDescription) -> Result<(), MailboxError> {
    self
      .mailbox
      .put(Mail::from_boxed(options, self.priority, description, action))
  }

  fn yield_now(&self) -> Result<(), MailboxError> {
    self.mailbox.check_is_mailbox_thread("yield")?;
    let mail = self.mailbox.take_for_yield(self.priority)?;
    tracing::trace!(mail = %mail, priority = self.priority, "Yielding to mail");
    mail.run()
  }

  fn try_yield(&self) -> Result<bool, MailboxError> {
    self.mailbox.check_is_mailbox_thread("try_yield")?;
    match self.mailbox.try_take_for_yield(self.priority)? {
      Some(mail) => {
        tracing::trace!(mail = %mail, priority = self.priority, "Yielding to mail");
        mail.run()?;
        Ok(true)
      }
      None => Ok(false),
    }
  }

  fn should_interrupt(&self) -> bool {
    self.interrupt.is_raised()
  }
}
