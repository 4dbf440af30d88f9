// src/config.rs

/// Default capacity for mailboxes created with [`MailboxConfig::default`].
/// Counts urgent and normal mail together.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1024;

/// Construction options for a [`TaskMailbox`](crate::mailbox::TaskMailbox).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxConfig {
  /// Maximum number of queued mails. Producers calling `put` on a full mailbox
  /// block until the mailbox thread frees a slot. Never zero.
  pub capacity: usize,
}

impl MailboxConfig {
  /// Creates a config with the given capacity, clamped to at least one slot.
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      capacity: capacity.max(1),
    }
  }

  pub(crate) fn effective_capacity(&self) -> usize {
    self.capacity.max(1)
  }
}

impl Default for MailboxConfig {
  fn default() -> Self {
    Self {
      capacity: DEFAULT_MAILBOX_CAPACITY,
    }
  }
}
