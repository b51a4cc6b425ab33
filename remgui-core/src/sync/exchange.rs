//! Single-slot, latest-wins ownership mailbox.
//!
//! The cross-thread handoff primitive of the whole pipeline: the
//! producer installs the newest value, silently destroying any value
//! the consumer never picked up, and the consumer takes ownership of
//! whatever is pending without blocking. Frames and input travel this
//! way — "drop old, keep newest" is the intended policy for them.

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// A lock-free mailbox holding at most one pending owned value.
///
/// `assign` and `take` are a single atomic pointer swap each, so the
/// consumer never observes a half-written value and neither side ever
/// blocks. One producer thread and one consumer thread per slot; if
/// several threads must produce into the same slot they have to
/// serialize among themselves.
pub struct ExchangeSlot<T> {
    pending: AtomicPtr<T>,
}

// The slot owns the boxed value between assign and take.
unsafe impl<T: Send> Send for ExchangeSlot<T> {}
unsafe impl<T: Send> Sync for ExchangeSlot<T> {}

impl<T> ExchangeSlot<T> {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self {
            pending: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Install `value` as the pending item.
    ///
    /// If a previous pending item was never taken it is dropped here —
    /// latest wins, nothing queues.
    pub fn assign(&self, value: T) {
        let fresh = Box::into_raw(Box::new(value));
        let stale = self.pending.swap(fresh, Ordering::AcqRel);
        if !stale.is_null() {
            // Superseded before the consumer saw it.
            drop(unsafe { Box::from_raw(stale) });
        }
    }

    /// Remove and return the pending item, or `None` if nothing is
    /// pending. Never blocks.
    pub fn take(&self) -> Option<T> {
        let taken = self.pending.swap(ptr::null_mut(), Ordering::AcqRel);
        if taken.is_null() {
            None
        } else {
            Some(*unsafe { Box::from_raw(taken) })
        }
    }

    /// Destroy any pending item. Used at session teardown.
    pub fn clear(&self) {
        drop(self.take());
    }

    /// Whether a value is currently pending.
    ///
    /// Advisory only — the answer may be stale by the time it is used.
    pub fn is_pending(&self) -> bool {
        !self.pending.load(Ordering::Acquire).is_null()
    }
}

impl<T> Default for ExchangeSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for ExchangeSlot<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    /// Counts drops so leak / double-free bugs show up as a wrong count.
    struct DropProbe(Arc<AtomicUsize>);

    impl Drop for DropProbe {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn take_from_empty_is_none() {
        let slot: ExchangeSlot<u32> = ExchangeSlot::new();
        assert!(slot.take().is_none());
        assert!(!slot.is_pending());
    }

    #[test]
    fn assign_then_take() {
        let slot = ExchangeSlot::new();
        slot.assign(42u32);
        assert!(slot.is_pending());
        assert_eq!(slot.take(), Some(42));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn latest_wins_drops_superseded_exactly_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let slot = ExchangeSlot::new();

        slot.assign((1u32, DropProbe(Arc::clone(&drops))));
        slot.assign((2u32, DropProbe(Arc::clone(&drops))));

        // First value destroyed by the second assign, never leaked.
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        let (id, probe) = slot.take().expect("second value pending");
        assert_eq!(id, 2);
        drop(probe);
        assert_eq!(drops.load(Ordering::SeqCst), 2);

        // Yields the newest value exactly once.
        assert!(slot.take().is_none());
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clear_destroys_pending() {
        let drops = Arc::new(AtomicUsize::new(0));
        let slot = ExchangeSlot::new();
        slot.assign(DropProbe(Arc::clone(&drops)));
        slot.clear();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(slot.take().is_none());
    }

    #[test]
    fn drop_releases_pending_value() {
        let drops = Arc::new(AtomicUsize::new(0));
        {
            let slot = ExchangeSlot::new();
            slot.assign(DropProbe(Arc::clone(&drops)));
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cross_thread_handoff() {
        let slot = Arc::new(ExchangeSlot::new());
        let producer = {
            let slot = Arc::clone(&slot);
            std::thread::spawn(move || {
                for i in 0..1000u64 {
                    slot.assign(i);
                }
            })
        };

        let mut last_seen = None;
        while !producer.is_finished() {
            if let Some(v) = slot.take() {
                last_seen = Some(v);
            }
        }
        producer.join().unwrap();

        // After the producer finished, the final value must be
        // observable (either already taken or still pending).
        let final_value = slot.take().or(last_seen);
        assert_eq!(final_value, Some(999));
    }
}
