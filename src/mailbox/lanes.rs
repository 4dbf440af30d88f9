// src/mailbox/lanes.rs

use std::collections::VecDeque;

use linked_hash_map::LinkedHashMap;

use crate::mail::Mail;

/// Storage behind [`TaskMailbox`](super::TaskMailbox): an urgent FIFO and a normal lane.
///
/// The normal lane is keyed by an enqueue sequence number so a yield can scan
/// it oldest-first and unlink the first eligible mail without disturbing the
/// order of the mails it skipped.
pub(crate) struct Lanes {
  urgent: VecDeque<Mail>,
  normal: LinkedHashMap<u64, Mail>,
  next_seq: u64,
}

impl Lanes {
  pub fn new() -> Self {
    Self {
      urgent: VecDeque::new(),
      normal: LinkedHashMap::new(),
      next_seq: 0,
    }
  }

  pub fn len(&self) -> usize {
    self.urgent.len() + self.normal.len()
  }

  pub fn is_empty(&self) -> bool {
    self.urgent.is_empty() && self.normal.is_empty()
  }

  pub fn push(&mut self, mail: Mail) {
    if mail.is_urgent() {
      self.urgent.push_back(mail);
    } else {
      let seq = self.next_seq;
      self.next_seq = self.next_seq.wrapping_add(1);
      self.normal.insert(seq, mail);
    }
  }

  /// Oldest urgent mail, else oldest normal mail.
  pub fn pop_for_main_loop(&mut self) -> Option<Mail> {
    self
      .urgent
      .pop_front()
      .or_else(|| self.normal.pop_front().map(|(_, mail)| mail))
  }

  /// Oldest urgent mail, else the oldest normal mail a yield at `min_priority` may run.
  pub fn pop_for_yield(&mut self, min_priority: i32) -> Option<Mail> {
    if let Some(mail) = self.urgent.pop_front() {
      return Some(mail);
    }
    let seq = self
      .normal
      .iter()
      .find(|(_, mail)| mail.is_yield_eligible(min_priority))
      .map(|(seq, _)| *seq)?;
    self.normal.remove(&seq)
  }

  /// Removes every queued mail, urgent lane first.
  pub fn drain(&mut self) -> Vec<Mail> {
    let mut drained = Vec::with_capacity(self.len());
    drained.extend(self.urgent.drain(..));
    while let Some((_, mail)) = self.normal.pop_front() {
      drained.push(mail);
    }
    drained
  }
}
