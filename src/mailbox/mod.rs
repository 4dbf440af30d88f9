// src/mailbox/mod.rs

//! The bounded, lane-aware mail queue shared by producers and the mailbox thread.

mod lanes;

use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};

use crate::config::MailboxConfig;
use crate::error::MailboxError;
use crate::mail::Mail;

use lanes::Lanes;

/// Lifecycle of a [`TaskMailbox`]. Transitions only move forward:
/// `Open -> Quiesced -> Closed` or `Open -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxState {
  /// Accepting and delivering mail.
  Open,
  /// Refusing new mail; queued mail can still be taken.
  Quiesced,
  /// Permanently shut. Queued mail was discarded.
  Closed,
}

struct MailboxInner {
  lanes: Lanes,
  state: MailboxState,
}

/// Bounded mail queue with an urgent lane and a normal lane.
///
/// Any thread may [`put`](TaskMailbox::put) mail. Taking mail is reserved for
/// the mailbox thread fixed at construction; calls from other threads fail
/// with [`MailboxError::IllegalThread`].
///
/// The capacity covers both lanes. A producer on a full, open mailbox blocks
/// until the mailbox thread takes something. The mailbox thread itself can
/// never wait on its own mailbox, so its `put` on a full mailbox is rejected.
pub struct TaskMailbox {
  inner: Mutex<MailboxInner>,
  /// Signalled on put, quiesce and close. Only the mailbox thread waits here.
  not_empty: Condvar,
  /// Signalled when a slot frees up, and on quiesce/close.
  not_full: Condvar,
  capacity: usize,
  owner: ThreadId,
}

impl TaskMailbox {
  /// Creates a mailbox owned by the calling thread.
  pub fn new(config: MailboxConfig) -> Self {
    Self::with_owner(config, thread::current().id())
  }

  /// Creates a mailbox owned by `owner`.
  pub fn with_owner(config: MailboxConfig, owner: ThreadId) -> Self {
    let capacity = config.effective_capacity();
    tracing::debug!(capacity, owner = ?owner, "Created task mailbox");
    Self {
      inner: Mutex::new(MailboxInner {
        lanes: Lanes::new(),
        state: MailboxState::Open,
      }),
      not_empty: Condvar::new(),
      not_full: Condvar::new(),
      capacity,
      owner,
    }
  }

  pub fn owner(&self) -> ThreadId {
    self.owner
  }

  pub fn is_mailbox_thread(&self) -> bool {
    thread::current().id() == self.owner
  }

  pub(crate) fn check_is_mailbox_thread(&self, operation: &'static str) -> Result<(), MailboxError> {
    if self.is_mailbox_thread() {
      Ok(())
    } else {
      tracing::warn!(operation, owner = ?self.owner, caller = ?thread::current().id(), "Mailbox-thread operation called from foreign thread");
      Err(MailboxError::IllegalThread { operation })
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn state(&self) -> MailboxState {
    self.inner.lock().state
  }

  /// Number of queued mails across both lanes.
  pub fn len(&self) -> usize {
    self.inner.lock().lanes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.lock().lanes.is_empty()
  }

  pub fn has_mail(&self) -> bool {
    !self.is_empty()
  }

  /// Enqueues `mail` at the tail of its lane.
  ///
  /// Blocks while the mailbox is open and full. Fails with
  /// [`MailboxError::Closed`] once closed (including while blocked) and with
  /// [`MailboxError::Rejected`] once quiesced, or when the mailbox thread
  /// would have to wait on its own full mailbox.
  pub fn put(&self, mail: Mail) -> Result<(), MailboxError> {
    let mut inner = self.inner.lock();
    loop {
      match inner.state {
        MailboxState::Closed => return Err(MailboxError::Closed),
        MailboxState::Quiesced => return Err(MailboxError::Rejected("mailbox is quiesced")),
        MailboxState::Open => {}
      }
      if inner.lanes.len() < self.capacity {
        break;
      }
      if self.is_mailbox_thread() {
        tracing::warn!(capacity = self.capacity, mail = %mail, "Mailbox thread put on its own full mailbox");
        return Err(MailboxError::Rejected(
          "mailbox is full and the mailbox thread cannot wait for itself",
        ));
      }
      tracing::trace!(capacity = self.capacity, "Mailbox full, producer waiting for a free slot");
      self.not_full.wait(&mut inner);
    }

    tracing::trace!(mail = %mail, urgent = mail.is_urgent(), priority = mail.priority(), "Mail enqueued");
    inner.lanes.push(mail);
    self.not_empty.notify_one();
    Ok(())
  }

  /// Blocking take for the main loop: the oldest urgent mail, else the oldest
  /// normal mail regardless of priority or deferrability.
  ///
  /// Returns `Ok(None)` once a quiesced mailbox has been drained, since no new
  /// mail can arrive any more.
  pub fn take_for_main_loop(&self) -> Result<Option<Mail>, MailboxError> {
    self.check_is_mailbox_thread("take_for_main_loop")?;
    let mut inner = self.inner.lock();
    loop {
      if let Some(taken) = self.take_main_locked(&mut inner)? {
        return Ok(Some(taken));
      }
      if inner.state == MailboxState::Quiesced {
        return Ok(None);
      }
      self.not_empty.wait(&mut inner);
    }
  }

  /// Non-blocking variant of [`take_for_main_loop`](Self::take_for_main_loop).
  pub fn try_take_for_main_loop(&self) -> Result<Option<Mail>, MailboxError> {
    self.check_is_mailbox_thread("try_take_for_main_loop")?;
    let mut inner = self.inner.lock();
    self.take_main_locked(&mut inner)
  }

  /// Non-blocking take for a yield at `min_priority`.
  ///
  /// Urgent mail is always returned first. Otherwise the normal lane is
  /// scanned oldest to newest for the first mail with
  /// `priority >= min_priority` that is not deferrable; mails skipped over keep
  /// their position. `Ok(None)` when nothing qualifies.
  pub fn try_take_for_yield(&self, min_priority: i32) -> Result<Option<Mail>, MailboxError> {
    self.check_is_mailbox_thread("try_take_for_yield")?;
    let mut inner = self.inner.lock();
    self.take_yield_locked(&mut inner, min_priority)
  }

  /// Blocking variant of [`try_take_for_yield`](Self::try_take_for_yield).
  ///
  /// Waits until an eligible mail arrives or the mailbox closes. On a
  /// quiesced mailbox without eligible mail this fails with
  /// [`MailboxError::Rejected`] instead of waiting forever.
  pub fn take_for_yield(&self, min_priority: i32) -> Result<Mail, MailboxError> {
    self.check_is_mailbox_thread("take_for_yield")?;
    let mut inner = self.inner.lock();
    loop {
      if let Some(taken) = self.take_yield_locked(&mut inner, min_priority)? {
        return Ok(taken);
      }
      if inner.state == MailboxState::Quiesced {
        return Err(MailboxError::Rejected(
          "mailbox is quiesced and holds no mail eligible for yield",
        ));
      }
      self.not_empty.wait(&mut inner);
    }
  }

  /// Stops accepting new mail. Already queued mail stays takeable.
  /// No effect unless the mailbox is open.
  pub fn quiesce(&self) {
    let mut inner = self.inner.lock();
    if inner.state != MailboxState::Open {
      return;
    }
    inner.state = MailboxState::Quiesced;
    let queued = inner.lanes.len();
    drop(inner);
    tracing::debug!(queued, "Mailbox quiesced");
    self.not_empty.notify_all();
    self.not_full.notify_all();
  }

  /// Closes the mailbox for good and returns the mail that was still queued.
  ///
  /// Every thread blocked in `put` or a blocking take wakes up with
  /// [`MailboxError::Closed`]. The returned mail is never executed by the
  /// mailbox; dropping it releases its resources.
  pub fn close(&self) -> Vec<Mail> {
    let mut inner = self.inner.lock();
    if inner.state == MailboxState::Closed {
      return Vec::new();
    }
    inner.state = MailboxState::Closed;
    let discarded = inner.lanes.drain();
    drop(inner);
    tracing::debug!(discarded = discarded.len(), "Mailbox closed");
    self.not_empty.notify_all();
    self.not_full.notify_all();
    discarded
  }

  fn take_main_locked(&self, inner: &mut MailboxInner) -> Result<Option<Mail>, MailboxError> {
    if inner.state == MailboxState::Closed {
      return Err(MailboxError::Closed);
    }
    let taken = inner.lanes.pop_for_main_loop();
    if taken.is_some() {
      self.not_full.notify_one();
    }
    Ok(taken)
  }

  fn take_yield_locked(&self, inner: &mut MailboxInner, min_priority: i32) -> Result<Option<Mail>, MailboxError> {
    if inner.state == MailboxState::Closed {
      return Err(MailboxError::Closed);
    }
    let taken = inner.lanes.pop_for_yield(min_priority);
    if taken.is_some() {
      self.not_full.notify_one();
    }
    Ok(taken)
  }
}

impl std::fmt::Debug for TaskMailbox {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let inner = self.inner.lock();
    f.debug_struct("TaskMailbox")
      .field("state", &inner.state)
      .field("len", &inner.lanes.len())
      .field("capacity", &self.capacity)
      .field("owner", &self.owner)
      .finish()
  }
}
