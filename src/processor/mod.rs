// src/processor/mod.rs

//! The mailbox loop run by the task's single execution thread.

pub mod default_action;
pub mod fatal;

pub use default_action::{DefaultAction, DefaultActionController, Suspension};
pub use fatal::{FatalErrorHandler, LoggingFatalErrorHandler};

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::MailboxConfig;
use crate::error::{panic_message, ActionError, MailboxError};
use crate::executor::TaskMailboxExecutor;
use crate::interrupt::InterruptFlag;
use crate::mail::Mail;
use crate::mailbox::TaskMailbox;

/// Lifecycle of a [`MailboxProcessor`]: `Running -> Quiescing -> Closed`, or
/// straight to `Closed` on a fatal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
  Running,
  /// Graceful shutdown requested: no new mail, remaining mail is drained.
  Quiescing,
  Closed,
}

/// State shared between the processor and its [`MailboxControl`] handles.
#[derive(Debug)]
pub(crate) struct ProcessorShared {
  state: Mutex<ProcessorState>,
  default_action_suspended: AtomicBool,
  external_failure: Mutex<Option<ActionError>>,
}

impl ProcessorShared {
  fn new() -> Self {
    Self {
      state: Mutex::new(ProcessorState::Running),
      default_action_suspended: AtomicBool::new(false),
      external_failure: Mutex::new(None),
    }
  }

  /// Returns `true` if the flag changed.
  pub(crate) fn set_suspended(&self, suspended: bool) -> bool {
    self.default_action_suspended.swap(suspended, Ordering::AcqRel) != suspended
  }

  pub(crate) fn is_suspended(&self) -> bool {
    self.default_action_suspended.load(Ordering::Acquire)
  }

  fn state(&self) -> ProcessorState {
    *self.state.lock()
  }

  fn set_closed(&self) {
    *self.state.lock() = ProcessorState::Closed;
  }

  fn take_external_failure(&self) -> Option<ActionError> {
    self.external_failure.lock().take()
  }
}

/// Cloneable lifecycle handle for a [`MailboxProcessor`], usable from any thread.
#[derive(Debug, Clone)]
pub struct MailboxControl {
  pub(crate) mailbox: Arc<TaskMailbox>,
  pub(crate) shared: Arc<ProcessorShared>,
}

impl MailboxControl {
  pub fn state(&self) -> ProcessorState {
    self.shared.state()
  }

  /// Requests a graceful shutdown: the mailbox stops accepting mail, the
  /// loop stops calling the default action, drains what is queued and exits.
  /// No effect unless the processor is running.
  pub fn quiesce(&self) {
    {
      let mut state = self.shared.state.lock();
      if *state != ProcessorState::Running {
        return;
      }
      *state = ProcessorState::Quiescing;
    }
    tracing::debug!("Mailbox processor quiescing");
    self.mailbox.quiesce();
  }

  /// Reports a failure from outside the mailbox. The mailbox closes at once,
  /// queued mail is discarded and the loop exits with
  /// [`MailboxError::Fatal`] carrying `error`. Only the first report is kept.
  pub fn fail(&self, error: impl Into<ActionError>) {
    let error = error.into();
    tracing::warn!(error = %error, "Mailbox processor failure reported");
    {
      let mut slot = self.shared.external_failure.lock();
      if self.shared.state() == ProcessorState::Closed {
        tracing::debug!(error = %error, "Processor already closed, failure not delivered to the loop");
      } else if slot.is_none() {
        *slot = Some(error);
      }
    }
    self.shared.set_closed();
    let discarded = self.mailbox.close();
    if !discarded.is_empty() {
      tracing::debug!(discarded = discarded.len(), "Discarding queued mail after failure");
    }
  }
}

/// Consumer side of a task mailbox.
///
/// Created on, and driven by, the task's execution thread, which becomes the
/// mailbox thread. The loop takes urgent mail first, then normal mail in
/// arrival order, and runs each action synchronously. When a
/// [`DefaultAction`] is installed it runs whenever no mail is pending.
///
/// A failing `execute`-style mail (or default action) ends the loop: the
/// mailbox is closed, queued mail is discarded, the [`FatalErrorHandler`] is
/// notified and the failure is returned as [`MailboxError::Fatal`].
pub struct MailboxProcessor {
  mailbox: Arc<TaskMailbox>,
  interrupt: InterruptFlag,
  shared: Arc<ProcessorShared>,
  default_action: Option<Box<dyn DefaultAction>>,
  controller: DefaultActionController,
  fatal_handler: Arc<dyn FatalErrorHandler>,
  processed: u64,
}

impl MailboxProcessor {
  /// Creates a processor whose mailbox thread is the calling thread.
  pub fn new(config: MailboxConfig) -> Self {
    Self::with_mailbox(Arc::new(TaskMailbox::new(config)))
  }

  pub fn with_mailbox(mailbox: Arc<TaskMailbox>) -> Self {
    let shared = Arc::new(ProcessorShared::new());
    let controller = DefaultActionController::new(MailboxControl {
      mailbox: mailbox.clone(),
      shared: shared.clone(),
    });
    Self {
      mailbox,
      interrupt: InterruptFlag::new(),
      shared,
      default_action: None,
      controller,
      fatal_handler: Arc::new(LoggingFatalErrorHandler),
      processed: 0,
    }
  }

  pub fn with_default_action(mut self, action: impl DefaultAction + 'static) -> Self {
    self.default_action = Some(Box::new(action));
    self
  }

  pub fn with_fatal_error_handler(mut self, handler: impl FatalErrorHandler + 'static) -> Self {
    self.fatal_handler = Arc::new(handler);
    self
  }

  /// Shares an interrupt flag owned by the task runtime.
  pub fn with_interrupt_flag(mut self, interrupt: InterruptFlag) -> Self {
    self.interrupt = interrupt;
    self
  }

  pub fn mailbox(&self) -> &Arc<TaskMailbox> {
    &self.mailbox
  }

  pub fn interrupt_flag(&self) -> &InterruptFlag {
    &self.interrupt
  }

  /// Creates an executor submitting with `priority` into this processor's mailbox.
  pub fn executor(&self, priority: i32) -> TaskMailboxExecutor {
    TaskMailboxExecutor::new(self.mailbox.clone(), priority, self.interrupt.clone())
  }

  pub fn control(&self) -> MailboxControl {
    MailboxControl {
      mailbox: self.mailbox.clone(),
      shared: self.shared.clone(),
    }
  }

  pub fn state(&self) -> ProcessorState {
    self.shared.state()
  }

  /// Number of mails run by this processor's loop and steps. Mail run through
  /// an executor's yield is not counted.
  pub fn processed_mail_count(&self) -> u64 {
    self.processed
  }

  /// Whether the loop would call the default action right now.
  pub fn is_default_action_available(&self) -> bool {
    self.default_action.is_some() && !self.shared.is_suspended() && self.shared.state() == ProcessorState::Running
  }

  /// Same as [`MailboxControl::quiesce`].
  pub fn quiesce(&self) {
    self.control().quiesce();
  }

  /// Closes the mailbox and returns the mail that never ran.
  pub fn close(&mut self) -> Vec<Mail> {
    self.shared.set_closed();
    self.mailbox.close()
  }

  /// Runs the mailbox loop until the processor closes.
  ///
  /// Returns `Ok(())` after a graceful quiesce has drained the mailbox or
  /// after the mailbox was closed, and [`MailboxError::Fatal`] when a mail or
  /// the default action failed or a failure was reported through
  /// [`MailboxControl::fail`].
  pub fn run_mailbox_loop(&mut self) -> Result<(), MailboxError> {
    self.mailbox.check_is_mailbox_thread("run_mailbox_loop")?;
    tracing::debug!(default_action = self.default_action.is_some(), "Mailbox loop starting");

    let outcome = self.run_loop();
    match &outcome {
      Ok(()) => tracing::debug!(processed = self.processed, "Mailbox loop finished"),
      Err(error) => self.abort(error),
    }
    outcome
  }

  /// Runs at most one pending mail without blocking. Returns whether a mail ran.
  ///
  /// A failing or panicking `execute`-style mail is fatal here as well: the
  /// mailbox is closed, queued mail is discarded and the
  /// [`FatalErrorHandler`] is notified before [`MailboxError::Fatal`] is returned.
  pub fn run_mailbox_step(&mut self) -> Result<bool, MailboxError> {
    self.mailbox.check_is_mailbox_thread("run_mailbox_step")?;
    match self.mailbox.try_take_for_main_loop()? {
      Some(mail) => match self.run_mail(mail) {
        Ok(()) => Ok(true),
        Err(error) => {
          self.abort(&error);
          Err(error)
        }
      },
      None => Ok(false),
    }
  }

  /// Closes the mailbox after a fatal failure and notifies the handler.
  fn abort(&mut self, error: &MailboxError) {
    let discarded = self.close();
    tracing::debug!(
      processed = self.processed,
      discarded = discarded.len(),
      "Mailbox loop aborted"
    );
    drop(discarded);
    self.fatal_handler.on_fatal_error(error);
  }

  fn run_loop(&mut self) -> Result<(), MailboxError> {
    loop {
      if self.is_default_action_available() {
        // Pending mail goes first, then one unit of default work.
        match self.mailbox.try_take_for_main_loop() {
          Ok(Some(mail)) => {
            self.run_mail(mail)?;
            continue;
          }
          Ok(None) => {}
          Err(MailboxError::Closed) => return self.finish_closed(),
          Err(other) => return Err(other),
        }
        self.run_default_action()?;
        continue;
      }

      match self.mailbox.take_for_main_loop() {
        Ok(Some(mail)) => self.run_mail(mail)?,
        Ok(None) => {
          // Quiesced and drained: nothing can arrive any more. A failure
          // reported meanwhile still wins.
          self.mailbox.close();
          return self.finish_closed();
        }
        Err(MailboxError::Closed) => return self.finish_closed(),
        Err(other) => return Err(other),
      }
    }
  }

  fn run_mail(&mut self, mail: Mail) -> Result<(), MailboxError> {
    tracing::trace!(mail = %mail, urgent = mail.is_urgent(), priority = mail.priority(), "Running mail");
    self.processed += 1;
    mail.run_catching_panic().map_err(MailboxError::into_fatal)
  }

  fn run_default_action(&mut self) -> Result<(), MailboxError> {
    let Some(action) = self.default_action.as_mut() else {
      return Ok(());
    };
    let controller = &mut self.controller;
    match panic::catch_unwind(AssertUnwindSafe(|| action.run_default_action(controller))) {
      Ok(result) => result.map_err(|source| MailboxError::action_failed("default action", source).into_fatal()),
      Err(payload) => Err(
        MailboxError::ActionPanicked {
          description: "default action".to_string(),
          message: panic_message(payload.as_ref()),
        }
        .into_fatal(),
      ),
    }
  }

  fn finish_closed(&mut self) -> Result<(), MailboxError> {
    self.shared.set_closed();
    match self.shared.take_external_failure() {
      Some(error) => Err(MailboxError::Fatal(error)),
      None => Ok(()),
    }
  }
}

impl std::fmt::Debug for MailboxProcessor {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MailboxProcessor")
      .field("mailbox", &self.mailbox)
      .field("state", &self.state())
      .field("default_action", &self.default_action.is_some())
      .field("processed", &self.processed)
      .finish_non_exhaustive()
  }
}
