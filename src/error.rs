// src/error.rs

use thiserror::Error;

/// Error type produced by a mail body.
///
/// Any `std::error::Error` that can cross threads converts into it with `?` or `.into()`.
pub type ActionError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result returned by every mail body.
pub type ActionResult = Result<(), ActionError>;

#[derive(Error, Debug)]
#[non_exhaustive] // Allows adding more variants later without breaking change
pub enum MailboxError {
  // --- Submission Errors ---
  /// The mailbox refused new mail but is not closed (quiesced, or the mailbox
  /// thread would block on its own full mailbox). Callers may retry or abandon.
  #[error("Mail rejected: {0}")]
  Rejected(&'static str),

  /// The mailbox is permanently closed. Callers must stop submitting.
  #[error("Mailbox is closed")]
  Closed,

  // --- Execution Errors ---
  #[error("Mail '{description}' failed: {source}")]
  ActionFailed {
    description: String,
    #[source]
    source: ActionError,
  },

  /// Only produced for mail created through `submit`, which captures panics into its handle.
  #[error("Mail '{description}' panicked: {message}")]
  ActionPanicked { description: String, message: String },

  // --- Contract Violations ---
  #[error("{operation} must be called from the mailbox thread")]
  IllegalThread { operation: &'static str },

  // --- Task Termination ---
  /// The mailbox loop stopped because an `execute`-style mail failed or a
  /// failure was reported from outside the mailbox thread.
  #[error("Fatal task failure: {0}")]
  Fatal(#[source] ActionError),
}

impl MailboxError {
  /// Builds an [`MailboxError::ActionFailed`] for the mail with the given description.
  pub(crate) fn action_failed(description: impl ToString, source: ActionError) -> Self {
    MailboxError::ActionFailed {
      description: description.to_string(),
      source,
    }
  }

  /// Converts a failure that escaped the main loop into the fatal signal.
  /// Errors that are already fatal are passed through unchanged.
  pub(crate) fn into_fatal(self) -> Self {
    match self {
      fatal @ MailboxError::Fatal(_) => fatal,
      other => MailboxError::Fatal(Box::new(other)),
    }
  }

  /// `true` for [`MailboxError::Closed`].
  pub fn is_closed(&self) -> bool {
    matches!(self, MailboxError::Closed)
  }

  /// `true` for [`MailboxError::Rejected`].
  pub fn is_rejected(&self) -> bool {
    matches!(self, MailboxError::Rejected(_))
  }
}

/// Best-effort text of a panic payload caught with `catch_unwind`.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&'static str>() {
    (*message).to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
