// src/mail/mod.rs

//! The unit of work carried by the mailbox.

pub mod description;

pub use description::{DescriptionArg, MailDescription};

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use bitflags::bitflags;

use crate::error::{panic_message, ActionResult, MailboxError};

/// Lowest priority. A yield with this threshold accepts mail from every executor.
pub const MIN_PRIORITY: i32 = -1;
/// Highest priority.
pub const MAX_PRIORITY: i32 = i32::MAX;

bitflags! {
  /// Scheduling options attached to a [`Mail`]. Both flags are independent.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
  pub struct MailOptions: u8 {
    /// Dequeued ahead of every non-urgent mail, and always eligible for yield.
    const URGENT = 0b01;
    /// Never picked up by `yield`/`try_yield`; only the main loop runs it.
    const DEFERRABLE = 0b10;
  }
}

impl MailOptions {
  /// No flags set.
  pub const fn options() -> Self {
    Self::empty()
  }

  pub const fn urgent() -> Self {
    Self::URGENT
  }

  pub const fn deferrable() -> Self {
    Self::DEFERRABLE
  }

  pub const fn is_urgent(&self) -> bool {
    self.contains(Self::URGENT)
  }

  pub const fn is_deferrable(&self) -> bool {
    self.contains(Self::DEFERRABLE)
  }
}

/// Boxed mail body.
pub type MailAction = Box<dyn FnOnce() -> ActionResult + Send + 'static>;

/// An action queued in the mailbox together with its scheduling metadata.
///
/// Immutable once built; consumed by [`Mail::run`]. Dropping a mail without
/// running it discards the action.
pub struct Mail {
  action: MailAction,
  description: MailDescription,
  options: MailOptions,
  priority: i32,
}

impl Mail {
  pub fn new<F>(options: MailOptions, priority: i32, description: impl Into<MailDescription>, action: F) -> Self
  where
    F: FnOnce() -> ActionResult + Send + 'static,
  {
    Self {
      action: Box::new(action),
      description: description.into(),
      options,
      priority,
    }
  }

  pub(crate) fn from_boxed(options: MailOptions, priority: i32, description: MailDescription, action: MailAction) -> Self {
    Self {
      action,
      description,
      options,
      priority,
    }
  }

  pub fn options(&self) -> MailOptions {
    self.options
  }

  pub fn priority(&self) -> i32 {
    self.priority
  }

  pub fn description(&self) -> &MailDescription {
    &self.description
  }

  pub fn is_urgent(&self) -> bool {
    self.options.is_urgent()
  }

  pub fn is_deferrable(&self) -> bool {
    self.options.is_deferrable()
  }

  /// Whether a yield with the given threshold may run this mail.
  /// Urgent mail is always eligible.
  pub fn is_yield_eligible(&self, min_priority: i32) -> bool {
    self.is_urgent() || (!self.is_deferrable() && self.priority >= min_priority)
  }

  /// Runs the action on the calling thread. A failure is wrapped with the
  /// rendered description.
  pub fn run(self) -> Result<(), MailboxError> {
    let Mail {
      action, description, ..
    } = self;
    action().map_err(|source| MailboxError::action_failed(&description, source))
  }

  /// Like [`run`](Mail::run), but a panicking action is caught and reported
  /// as [`MailboxError::ActionPanicked`].
  pub(crate) fn run_catching_panic(self) -> Result<(), MailboxError> {
    let Mail {
      action, description, ..
    } = self;
    match panic::catch_unwind(AssertUnwindSafe(action)) {
      Ok(result) => result.map_err(|source| MailboxError::action_failed(&description, source)),
      Err(payload) => Err(MailboxError::ActionPanicked {
        description: description.to_string(),
        message: panic_message(payload.as_ref()),
      }),
    }
  }
}

impl fmt::Debug for Mail {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Mail")
      .field("description", &self.description)
      .field("options", &self.options)
      .field("priority", &self.priority)
      .finish_non_exhaustive()
  }
}

impl fmt::Display for Mail {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.description, f)
  }
}
