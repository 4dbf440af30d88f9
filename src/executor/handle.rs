// src/executor/handle.rs

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::error::MailboxError;

pub(crate) type ResultSender<T> = oneshot::Sender<Result<T, MailboxError>>;

/// Result handle returned by [`MailboxExecutor::submit`](super::MailboxExecutor::submit).
///
/// Resolves once the mailbox thread has run the submitted mail: with the
/// action's value, with its captured failure, or with [`MailboxError::Closed`]
/// if the mail was discarded before it ran. The handle can be waited on
/// synchronously with [`wait`](MailHandle::wait), polled with
/// [`try_result`](MailHandle::try_result), or `.await`ed.
#[derive(Debug)]
pub struct MailHandle<T> {
  receiver: oneshot::Receiver<Result<T, MailboxError>>,
  cancelled: Arc<AtomicBool>,
}

/// Producer half held by the wrapped action.
pub(crate) struct Completion<T> {
  sender: ResultSender<T>,
  cancelled: Arc<AtomicBool>,
}

pub(crate) fn completion_pair<T>() -> (Completion<T>, MailHandle<T>) {
  let (sender, receiver) = oneshot::channel();
  let cancelled = Arc::new(AtomicBool::new(false));
  (
    Completion {
      sender,
      cancelled: cancelled.clone(),
    },
    MailHandle { receiver, cancelled },
  )
}

impl<T> Completion<T> {
  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::Acquire)
  }

  pub fn complete(self, result: Result<T, MailboxError>) {
    // The handle may have been dropped; nobody is left to observe the result.
    let _ = self.sender.send(result);
  }
}

impl<T> MailHandle<T> {
  /// Blocks the calling thread until the mail has run or was discarded.
  ///
  /// Must not be called on the mailbox thread before the mail has run (it
  /// would wait for itself), nor from within an async runtime; `.await` the
  /// handle there instead.
  pub fn wait(self) -> Result<T, MailboxError> {
    self.receiver.blocking_recv().unwrap_or(Err(MailboxError::Closed))
  }

  /// Returns the outcome if it is already known, `None` while still pending.
  pub fn try_result(&mut self) -> Option<Result<T, MailboxError>> {
    match self.receiver.try_recv() {
      Ok(result) => Some(result),
      Err(TryRecvError::Empty) => None,
      Err(TryRecvError::Closed) => Some(Err(MailboxError::Closed)),
    }
  }

  /// Asks the mail to skip its action. The mail stays queued and is still
  /// consumed by the mailbox thread; it just does nothing when it runs, and
  /// the handle then resolves with [`MailboxError::Closed`]. Has no effect
  /// once the action has started.
  pub fn cancel(&self) {
    self.cancelled.store(true, Ordering::Release);
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::Acquire)
  }
}

impl<T> Future for MailHandle<T> {
  type Output = Result<T, MailboxError>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    Pin::new(&mut self.receiver)
      .poll(cx)
      .map(|received| received.unwrap_or(Err(MailboxError::Closed)))
  }
}
