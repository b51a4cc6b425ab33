//! Fixed-capacity single-producer/single-consumer FIFO.
//!
//! Carries small scalar streams (typed character codes) between the
//! session task and the UI thread. Writes beyond capacity are silently
//! truncated — losing a typed character under extreme backlog is an
//! acceptable trade for a debug-UI input path, blocking is not.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free SPSC ring buffer of `N` POD elements.
///
/// Cursors are free-running counters; `write - read` is the number of
/// queued elements. Exactly one producer thread calls [`write`] and
/// exactly one consumer thread calls [`read`].
///
/// [`write`]: RingBuffer::write
/// [`read`]: RingBuffer::read
pub struct RingBuffer<T, const N: usize> {
    storage: UnsafeCell<[T; N]>,
    write: AtomicUsize,
    read: AtomicUsize,
}

unsafe impl<T: Send + Copy, const N: usize> Send for RingBuffer<T, N> {}
unsafe impl<T: Send + Copy, const N: usize> Sync for RingBuffer<T, N> {}

impl<T: Copy + Default, const N: usize> RingBuffer<T, N> {
    /// Create an empty ring.
    pub fn new() -> Self {
        Self {
            storage: UnsafeCell::new([T::default(); N]),
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
        }
    }

    /// Capacity in elements.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of elements currently queued.
    pub fn len(&self) -> usize {
        self.write
            .load(Ordering::Acquire)
            .wrapping_sub(self.read.load(Ordering::Acquire))
    }

    /// Whether the ring is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append up to `items.len()` elements, truncating to the free
    /// space left. Returns how many were actually written.
    ///
    /// Producer side only.
    pub fn write(&self, items: &[T]) -> usize {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);
        let free = N - write.wrapping_sub(read);
        let count = items.len().min(free);

        let storage = self.storage.get() as *mut T;
        for (i, item) in items[..count].iter().enumerate() {
            // Sole producer: nothing else writes these cells, and the
            // consumer will not read them before the Release below.
            unsafe { storage.add(write.wrapping_add(i) % N).write(*item) };
        }

        self.write.store(write.wrapping_add(count), Ordering::Release);
        count
    }

    /// Remove up to `out.len()` of the oldest elements into `out`.
    /// Returns how many were actually read; zero when empty, never
    /// blocks.
    ///
    /// Consumer side only.
    pub fn read(&self, out: &mut [T]) -> usize {
        let read = self.read.load(Ordering::Relaxed);
        let write = self.write.load(Ordering::Acquire);
        let queued = write.wrapping_sub(read);
        let count = out.len().min(queued);

        let storage = self.storage.get() as *const T;
        for (i, slot) in out[..count].iter_mut().enumerate() {
            *slot = unsafe { storage.add(read.wrapping_add(i) % N).read() };
        }

        self.read.store(read.wrapping_add(count), Ordering::Release);
        count
    }
}

impl<T: Copy + Default, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────
