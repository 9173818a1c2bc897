//! Idempotency guard for delivered events.
//!
//! # Design
//! - The first delivery of an `event_id` is admitted; every later delivery of the
//!   same id is reported as a duplicate and must not repeat side effects.
//! - Counters are lock-free; the id set sits behind a mutex that tolerates poisoning.
//! - Memory is bounded: once `capacity` ids are held, the oldest accepted id is
//!   forgotten. A relay only redelivers events it still holds as pending, so the
//!   window must cover the largest backlog a relay can accumulate; a redelivery
//!   of an evicted id is processed again.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Outcome of presenting an event id to the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Never seen before; process it.
    First,
    /// Already processed; acknowledge without side effects.
    Duplicate,
}

impl Admission {
    /// Message returned to the caller for this admission.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::First => "ok",
            Self::Duplicate => "duplicate",
        }
    }
}

/// Ids remembered by a default guard.
pub const DEFAULT_GUARD_CAPACITY: usize = 1_000_000;

#[derive(Debug, Default)]
struct SeenIds {
    ids: HashSet<String>,
    order: VecDeque<String>,
}

/// Set of accepted event ids with delivery counters.
#[derive(Debug)]
pub struct DuplicateGuard {
    seen: Mutex<SeenIds>,
    capacity: usize,
    received: AtomicU64,
    duplicates: AtomicU64,
}

impl Default for DuplicateGuard {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_GUARD_CAPACITY)
    }
}

impl DuplicateGuard {
    /// Empty guard remembering [`DEFAULT_GUARD_CAPACITY`] ids.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty guard remembering at most `capacity` ids (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: Mutex::new(SeenIds::default()),
            capacity: capacity.max(1),
            received: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
        }
    }

    /// Record a delivery of `event_id` and report whether it is the first.
    pub fn check(&self, event_id: &str) -> Admission {
        self.received.fetch_add(1, Ordering::Relaxed);
        let mut seen = self.lock();
        if seen.ids.contains(event_id) {
            self.duplicates.fetch_add(1, Ordering::Relaxed);
            return Admission::Duplicate;
        }
        if seen.order.len() >= self.capacity
            && let Some(oldest) = seen.order.pop_front()
        {
            seen.ids.remove(&oldest);
        }
        seen.ids.insert(event_id.to_string());
        seen.order.push_back(event_id.to_string());
        Admission::First
    }

    /// Whether `event_id` is currently remembered as accepted.
    #[must_use]
    pub fn contains(&self, event_id: &str) -> bool {
        self.lock().ids.contains(event_id)
    }

    /// Deliveries seen, duplicates included.
    #[must_use]
    pub fn total_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Deliveries rejected as duplicates.
    #[must_use]
    pub fn total_duplicates(&self) -> u64 {
        self.duplicates.load(Ordering::Relaxed)
    }

    /// Distinct event ids currently remembered.
    #[must_use]
    pub fn unique(&self) -> usize {
        self.lock().ids.len()
    }

    fn lock(&self) -> MutexGuard<'_, SeenIds> {
        self.seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn repeat_delivery_is_a_duplicate() {
        let guard = DuplicateGuard::new();
        assert_eq!(guard.check("e-1"), Admission::First);
        assert_eq!(guard.check("e-1"), Admission::Duplicate);
        assert_eq!(guard.check("e-2"), Admission::First);
        assert!(guard.contains("e-1"));
        assert!(!guard.contains("e-3"));
        assert_eq!(guard.total_received(), 3);
        assert_eq!(guard.total_duplicates(), 1);
        assert_eq!(guard.unique(), 2);
        assert_eq!(Admission::Duplicate.message(), "duplicate");
    }

    #[test]
    fn oldest_ids_are_forgotten_at_capacity() {
        let guard = DuplicateGuard::with_capacity(2);
        assert_eq!(guard.check("e-1"), Admission::First);
        assert_eq!(guard.check("e-2"), Admission::First);
        assert_eq!(guard.check("e-2"), Admission::Duplicate);
        assert_eq!(guard.check("e-3"), Admission::First);

        assert_eq!(guard.unique(), 2);
        assert!(!guard.contains("e-1"));
        assert!(guard.contains("e-2"));
        assert_eq!(guard.check("e-3"), Admission::Duplicate);
        assert_eq!(guard.check("e-1"), Admission::First);
        assert!(!guard.contains("e-2"));
    }

    #[test]
    fn concurrent_deliveries_admit_exactly_once() {
        let guard = Arc::new(DuplicateGuard::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = Arc::clone(&guard);
                std::thread::spawn(move || guard.check("shared") == Admission::First)
            })
            .collect();
        let firsts = handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(false))
            .filter(|first| *first)
            .count();
        assert_eq!(firsts, 1);
        assert_eq!(guard.total_duplicates(), 7);
    }
}
