//! taskmail - a mailbox-based cooperative task executor.
//!
//! Every task owns one [`TaskMailbox`] and exactly one execution thread, the
//! mailbox thread. Any thread may hand work to the task through a
//! [`MailboxExecutor`]; the mailbox thread runs it one [`Mail`] at a time from
//! [`MailboxProcessor::run_mailbox_loop`], or earlier through
//! [`MailboxExecutor::yield_now`] while it is blocked in a long operation.

pub mod config;
pub mod error;
pub mod executor;
pub mod interrupt;
pub mod mail;
pub mod mailbox;
pub mod processor;

// Re-export core types for user convenience
pub use config::{MailboxConfig, DEFAULT_MAILBOX_CAPACITY};
pub use error::{ActionError, ActionResult, MailboxError};
pub use executor::{MailHandle, MailboxExecutor, TaskMailboxExecutor};
pub use interrupt::InterruptFlag;
pub use mail::{Mail, MailAction, MailDescription, MailOptions, MAX_PRIORITY, MIN_PRIORITY};
pub use mailbox::{MailboxState, TaskMailbox};
pub use processor::{
  DefaultAction, DefaultActionController, FatalErrorHandler, LoggingFatalErrorHandler, MailboxControl,
  MailboxProcessor, ProcessorState, Suspension,
};

static_assertions::assert_impl_all!(TaskMailbox: Send, Sync);
static_assertions::assert_impl_all!(TaskMailboxExecutor: Send, Sync, Clone);
static_assertions::assert_impl_all!(Mail: Send);
static_assertions::assert_impl_all!(MailboxControl: Send, Sync, Clone);
static_assertions::assert_impl_all!(Suspension: Send, Sync, Clone);
static_assertions::assert_impl_all!(MailHandle<u64>: Send);

// --- Top-Level Functions ---

const VERSION_MAJOR: i32 = 0;
const VERSION_MINOR: i32 = 1;
const VERSION_PATCH: i32 = 0;

/// Returns the library version as a tuple (major, minor, patch).
pub fn version() -> (i32, i32, i32) {
  (VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH)
}

/// Returns the major version number of the library.
pub fn version_major() -> i32 {
  VERSION_MAJOR
}

/// Returns the minor version number of the library.
pub fn version_minor() -> i32 {
  VERSION_MINOR
}

/// Returns the patch version number of the library.
pub fn version_patch() -> i32 {
  VERSION_PATCH
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_version_parts_match_tuple() {
    assert_eq!(version(), (version_major(), version_minor(), version_patch()));
  }
}
