// src/processor/fatal.rs

use crate::error::MailboxError;

/// Sink for failures that end the mailbox loop.
///
/// Provided by the task runtime. Invoked once, on the mailbox thread, after
/// the mailbox has been closed.
pub trait FatalErrorHandler: Send + Sync {
  fn on_fatal_error(&self, error: &MailboxError);
}

/// Default sink: logs the failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingFatalErrorHandler;

impl FatalErrorHandler for LoggingFatalErrorHandler {
  fn on_fatal_error(&self, error: &MailboxError) {
    tracing::error!(error = %error, "Mailbox loop terminated by fatal failure");
  }
}

impl<F> FatalErrorHandler for F
where
  F: Fn(&MailboxError) + Send + Sync,
{
  fn on_fatal_error(&self, error: &MailboxError) {
    self(error)
  }
}
