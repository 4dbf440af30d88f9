// tests/common.rs
#![allow(dead_code)]

use taskmail::{
  ActionResult, InterruptFlag, MailboxConfig, MailboxControl, MailboxError, MailboxProcessor, TaskMailbox,
  TaskMailboxExecutor,
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use std::sync::{Arc, Once};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;

pub const SHORT_TIMEOUT: Duration = Duration::from_millis(250);
pub const LONG_TIMEOUT: Duration = Duration::from_secs(5);

static TRACING_INIT: Once = Once::new();

pub fn setup_tracing() {
  TRACING_INIT.call_once(|| {
    // Can be overridden by RUST_LOG
    let default_filter = "taskmail=trace,info";
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = FmtSubscriber::builder()
      .with_max_level(tracing::Level::TRACE)
      .with_env_filter(env_filter)
      .with_target(true)
      .with_line_number(true)
      .with_test_writer()
      .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set global tracing subscriber");
  });
}

/// Outcome of a task thread: what the loop returned and how many mails it ran.
pub type TaskOutcome = (Result<(), MailboxError>, u64);

/// A task thread owning a [`MailboxProcessor`]. The loop does not start until
/// [`TaskHarness::start`] (or [`TaskHarness::join`]) is called, so tests can
/// queue mail first and get deterministic ordering.
pub struct TaskHarness {
  mailbox: Arc<TaskMailbox>,
  control: MailboxControl,
  interrupt: InterruptFlag,
  start: Option<oneshot::Sender<()>>,
  thread: Option<JoinHandle<TaskOutcome>>,
}

impl TaskHarness {
  pub fn spawn(config: MailboxConfig) -> Self {
    Self::spawn_with(config, |processor| processor)
  }

  /// `configure` runs on the task thread, so it may install non-`Send` default actions.
  pub fn spawn_with<F>(config: MailboxConfig, configure: F) -> Self
  where
    F: FnOnce(MailboxProcessor) -> MailboxProcessor + Send + 'static,
  {
    setup_tracing();
    let (ready_tx, ready_rx) = oneshot::channel();
    let (start_tx, start_rx) = oneshot::channel::<()>();

    let thread = thread::Builder::new()
      .name("task-thread".into())
      .spawn(move || {
        let mut processor = configure(MailboxProcessor::new(config));
        let handles = (
          processor.mailbox().clone(),
          processor.control(),
          processor.interrupt_flag().clone(),
        );
        if ready_tx.send(handles).is_err() {
          return (Ok(()), 0);
        }
        // A dropped start sender also starts the loop.
        let _ = start_rx.blocking_recv();
        let result = processor.run_mailbox_loop();
        (result, processor.processed_mail_count())
      })
      .expect("Failed to spawn task thread");

    let (mailbox, control, interrupt) = ready_rx.blocking_recv().expect("Task thread died during setup");
    Self {
      mailbox,
      control,
      interrupt,
      start: Some(start_tx),
      thread: Some(thread),
    }
  }

  pub fn executor(&self, priority: i32) -> TaskMailboxExecutor {
    TaskMailboxExecutor::new(self.mailbox.clone(), priority, self.interrupt.clone())
  }

  pub fn mailbox(&self) -> &Arc<TaskMailbox> {
    &self.mailbox
  }

  pub fn control(&self) -> MailboxControl {
    self.control.clone()
  }

  pub fn interrupt_flag(&self) -> &InterruptFlag {
    &self.interrupt
  }

  pub fn start(&mut self) {
    if let Some(start) = self.start.take() {
      let _ = start.send(());
    }
  }

  /// Starts the loop if needed and waits for the task thread to finish.
  pub fn join(mut self) -> TaskOutcome {
    self.start();
    let thread = self.thread.take().expect("Task thread already joined");
    thread.join().expect("Task thread panicked")
  }

  /// Quiesces the processor and waits for the loop to drain and exit.
  pub fn quiesce_and_join(self) -> TaskOutcome {
    self.control.quiesce();
    self.join()
  }
}

/// Shared event log for ordering assertions.
#[derive(Clone, Default)]
pub struct EventLog {
  events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&self, event: impl Into<String>) {
    self.events.lock().push(event.into());
  }

  /// An action recording `event` when it runs.
  pub fn recorder(&self, event: impl Into<String>) -> impl FnOnce() -> ActionResult + Send + 'static {
    let log = self.clone();
    let event = event.into();
    move || {
      log.push(event);
      Ok(())
    }
  }

  pub fn events(&self) -> Vec<String> {
    self.events.lock().clone()
  }

  pub fn len(&self) -> usize {
    self.events.lock().len()
  }
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
  let deadline = Instant::now() + timeout;
  while Instant::now() < deadline {
    if condition() {
      return true;
    }
    thread::sleep(Duration::from_millis(2));
  }
  condition()
}
