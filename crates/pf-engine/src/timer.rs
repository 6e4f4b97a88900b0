//! Delayed callbacks
//!
//! Each mode owns one [`DelayQueue`]. Entries are keyed by name: scheduling
//! a name that is already pending replaces the earlier entry, and cancelling
//! removes it without firing. Every entry carries a sequence number drawn
//! from the machine-wide counter so that callbacks due in the same tick fire
//! in (fire time, insertion order) across all modes.

use std::fmt;

use pf_core::{PfResult, Timestamp};

use crate::ModeCx;

/// Deferred work for a mode of type `M`
pub type DelayHandler<M> = Box<dyn FnOnce(&mut M, &mut ModeCx<'_, M>) -> PfResult<()>>;

/// One pending callback
pub struct Delayed<M> {
    pub name: String,
    pub fire_at: Timestamp,
    pub seq: u64,
    pub handler: DelayHandler<M>,
}

impl<M> Delayed<M> {
    /// Due at `now` and scheduled before the tick began
    #[inline]
    pub fn is_due(&self, now: Timestamp, watermark: u64) -> bool {
        self.fire_at <= now && self.seq < watermark
    }
}

impl<M> fmt::Debug for Delayed<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delayed")
            .field("name", &self.name)
            .field("fire_at", &self.fire_at)
            .field("seq", &self.seq)
            .finish()
    }
}

/// Named delayed callbacks of one mode
pub struct DelayQueue<M> {
    entries: Vec<Delayed<M>>,
}

impl<M> Default for DelayQueue<M> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<M> fmt::Debug for DelayQueue<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

impl<M> DelayQueue<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `handler`; returns true if it replaced a pending entry
    pub fn schedule(&mut self, name: &str, fire_at: Timestamp, seq: u64, handler: DelayHandler<M>) -> bool {
        let replaced = self.cancel(name);
        self.entries.push(Delayed {
            name: name.to_string(),
            fire_at,
            seq,
            handler,
        });
        replaced
    }

    /// Remove without firing; unknown names are a no-op
    pub fn cancel(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.name != name);
        self.entries.len() != before
    }

    /// Drop every entry, returning how many were pending
    pub fn cancel_all(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Drop entries matching `f`, returning how many went
    pub fn cancel_where(&mut self, f: impl Fn(&Delayed<M>) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !f(entry));
        before - self.entries.len()
    }

    #[inline]
    pub fn is_pending(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    /// Milliseconds until `name` fires
    pub fn remaining(&self, name: &str, now: Timestamp) -> Option<u64> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.fire_at.since(now))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// (fire_at, seq) of the earliest entry due at `now`
    pub fn next_due(&self, now: Timestamp, watermark: u64) -> Option<(Timestamp, u64)> {
        self.entries
            .iter()
            .filter(|entry| entry.is_due(now, watermark))
            .map(|entry| (entry.fire_at, entry.seq))
            .min()
    }

    /// Remove and return the earliest entry due at `now`
    pub fn pop_due(&mut self, now: Timestamp, watermark: u64) -> Option<Delayed<M>> {
        let (fire_at, seq) = self.next_due(now, watermark)?;
        let index = self
            .entries
            .iter()
            .position(|entry| entry.fire_at == fire_at && entry.seq == seq)?;
        Some(self.entries.swap_remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u32);

    fn bump(amount: u32) -> DelayHandler<Counter> {
        Box::new(move |counter: &mut Counter, _: &mut ModeCx<'_, Counter>| {
            counter.0 += amount;
            Ok(())
        })
    }

    #[test]
    fn test_same_name_replaces() {
        let mut queue = DelayQueue::<Counter>::new();
        assert!(!queue.schedule("a", Timestamp(100), 1, bump(1)));
        assert!(queue.schedule("a", Timestamp(50), 2, bump(10)));
        assert_eq!(queue.len(), 1);
        let entry = queue.pop_due(Timestamp(100), u64::MAX).unwrap();
        assert_eq!(entry.seq, 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_due_order_and_watermark() {
        let mut queue = DelayQueue::<Counter>::new();
        queue.schedule("late", Timestamp(30), 1, bump(1));
        queue.schedule("early_b", Timestamp(10), 3, bump(1));
        queue.schedule("early_a", Timestamp(10), 2, bump(1));
        queue.schedule("fresh", Timestamp(0), 9, bump(1));

        let names: Vec<String> = std::iter::from_fn(|| queue.pop_due(Timestamp(30), 5))
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names, vec!["early_a", "early_b", "late"]);
        assert!(queue.is_pending("fresh"));
    }

    #[test]
    fn test_cancel_and_remaining() {
        let mut queue = DelayQueue::<Counter>::new();
        queue.schedule("taunt", Timestamp(10_000), 1, bump(1));
        assert_eq!(queue.remaining("taunt", Timestamp(4_000)), Some(6_000));
        assert!(queue.cancel("taunt"));
        assert!(!queue.cancel("taunt"));
        assert_eq!(queue.remaining("taunt", Timestamp(4_000)), None);
        queue.schedule("a", Timestamp(1), 2, bump(1));
        queue.schedule("b", Timestamp(1), 3, bump(1));
        assert_eq!(queue.cancel_all(), 2);
        assert!(queue.next_due(Timestamp(5), u64::MAX).is_none());
    }

    #[test]
    fn test_cancel_where_keeps_newer_entries() {
        let mut queue = DelayQueue::<Counter>::new();
        queue.schedule("old", Timestamp(100), 4, bump(1));
        queue.schedule("new", Timestamp(100), 9, bump(1));
        assert_eq!(queue.cancel_where(|entry| entry.seq < 5), 1);
        assert!(!queue.is_pending("old"));
        assert!(queue.is_pending("new"));
    }
}
