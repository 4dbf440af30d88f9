// tests/concurrency.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use parking_lot::Mutex;
use taskmail::{MailOptions, MailboxConfig, MailboxExecutor};
mod common;

use common::TaskHarness;

const PRODUCERS: usize = 8;
const MAILS_PER_PRODUCER: usize = 500;

// --- Test: N producers x M mails, every mail runs exactly once, per-producer order kept ---
#[test]
fn test_concurrent_producers_exactly_once_in_order() {
  let mut harness = TaskHarness::spawn(MailboxConfig::with_capacity(64));
  harness.start();

  let seen: Arc<Mutex<Vec<(usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));
  let barrier = Arc::new(Barrier::new(PRODUCERS));
  let producers: Vec<_> = (0..PRODUCERS)
    .map(|producer| {
      let executor = harness.executor(0);
      let seen = seen.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        for seq in 0..MAILS_PER_PRODUCER {
          let seen = seen.clone();
          executor
            .execute(
              move || {
                seen.lock().push((producer, seq));
                Ok(())
              },
              taskmail::describe!("producer {} mail {}", producer, seq),
            )
            .unwrap();
        }
      })
    })
    .collect();
  for producer in producers {
    producer.join().unwrap();
  }

  let (result, processed) = harness.quiesce_and_join();
  result.unwrap();
  assert_eq!(processed as usize, PRODUCERS * MAILS_PER_PRODUCER);

  let seen = seen.lock();
  assert_eq!(seen.len(), PRODUCERS * MAILS_PER_PRODUCER);
  let mut next_expected: HashMap<usize, usize> = HashMap::new();
  for &(producer, seq) in seen.iter() {
    let expected = next_expected.entry(producer).or_insert(0);
    assert_eq!(seq, *expected, "producer {} out of order", producer);
    *expected += 1;
  }
  assert!(next_expected.values().all(|&count| count == MAILS_PER_PRODUCER));
}

// --- Test: producers block on a full mailbox and resume as the loop drains it ---
#[test]
fn test_full_mailbox_applies_backpressure() {
  let harness = TaskHarness::spawn(MailboxConfig::with_capacity(2));
  let executor = harness.executor(0);
  let ran = Arc::new(AtomicUsize::new(0));

  for _ in 0..2 {
    let ran = ran.clone();
    executor
      .execute(
        move || {
          ran.fetch_add(1, Ordering::SeqCst);
          Ok(())
        },
        "fill",
      )
      .unwrap();
  }
  assert_eq!(harness.mailbox().len(), 2);

  let blocked_executor = executor.clone();
  let blocked_ran = ran.clone();
  let blocked = thread::spawn(move || {
    blocked_executor.execute(
      move || {
        blocked_ran.fetch_add(1, Ordering::SeqCst);
        Ok(())
      },
      "overflow",
    )
  });

  thread::sleep(common::SHORT_TIMEOUT);
  assert!(!blocked.is_finished(), "put on a full mailbox must wait");

  let mut harness = harness;
  harness.start();
  blocked.join().unwrap().unwrap();
  let (result, _) = harness.quiesce_and_join();
  result.unwrap();
  assert_eq!(ran.load(Ordering::SeqCst), 3);
}

// --- Test: a producer blocked on a full mailbox is released by close ---
#[test]
fn test_blocked_producer_released_by_close() {
  let harness = TaskHarness::spawn(MailboxConfig::with_capacity(1));
  let executor = harness.executor(0);
  executor.execute(|| Ok(()), "fill").unwrap();

  let blocked_executor = executor.clone();
  let blocked = thread::spawn(move || blocked_executor.execute(|| Ok(()), "overflow"));
  thread::sleep(common::SHORT_TIMEOUT);

  harness.control().fail("shutting down");
  assert!(blocked.join().unwrap().unwrap_err().is_closed());
  let (result, _) = harness.join();
  assert!(result.is_err());
}

// --- Test: urgent mail from many threads still overtakes normal mail ---
#[test]
fn test_concurrent_urgent_mail_overtakes_backlog() {
  let harness = TaskHarness::spawn(MailboxConfig::default());
  let order = Arc::new(Mutex::new(Vec::new()));

  let normal = harness.executor(0);
  for i in 0..50 {
    let order = order.clone();
    normal
      .execute(
        move || {
          order.lock().push(format!("n{}", i));
          Ok(())
        },
        "normal",
      )
      .unwrap();
  }

  let urgent_producers: Vec<_> = (0..4)
    .map(|producer| {
      let executor = harness.executor(0);
      let order = order.clone();
      thread::spawn(move || {
        executor
          .execute_with_options(
            MailOptions::urgent(),
            move || {
              order.lock().push(format!("u{}", producer));
              Ok(())
            },
            "urgent",
          )
          .unwrap();
      })
    })
    .collect();
  for producer in urgent_producers {
    producer.join().unwrap();
  }

  let (result, processed) = harness.quiesce_and_join();
  result.unwrap();
  assert_eq!(processed, 54);

  let order = order.lock();
  assert!(order[..4].iter().all(|event| event.starts_with('u')), "got {:?}", &order[..4]);
  let normals: Vec<_> = order[4..].iter().cloned().collect();
  let expected: Vec<_> = (0..50).map(|i| format!("n{}", i)).collect();
  assert_eq!(normals, expected);
}
