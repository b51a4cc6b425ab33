//! Per-session statistics: rolling frame rate and traffic counters.
//!
//! The estimator keeps `(timestamp, bytes)` samples for each received
//! frame over a rolling window and derives frames/second and
//! bytes/second from it, so a stalled client reads as 0 FPS within one
//! window instead of decaying slowly from a lifetime average.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

// ── FrameRateEstimator ───────────────────────────────────────────

/// Rolling-window frame rate and throughput estimator.
pub struct FrameRateEstimator {
    /// Samples: `(when, bytes)`, one per frame.
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    /// Running total of frame bytes in the window.
    total_bytes: u64,
}

impl FrameRateEstimator {
    /// Create an estimator with a 2-second rolling window.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(2))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(256),
            window,
            total_bytes: 0,
        }
    }

    /// Record one received frame of `bytes` at the current instant.
    pub fn record_frame(&mut self, bytes: u64) {
        self.record_frame_at(Instant::now(), bytes);
    }

    /// Record with an explicit timestamp (useful for testing).
    pub fn record_frame_at(&mut self, when: Instant, bytes: u64) {
        self.samples.push_back((when, bytes));
        self.total_bytes += bytes;
        self.evict(when);
    }

    /// Frames per second over the rolling window.
    pub fn fps(&self) -> f64 {
        self.fps_at(Instant::now())
    }

    /// FPS as seen from an explicit instant (useful for testing).
    pub fn fps_at(&self, now: Instant) -> f64 {
        let first = match self.samples.front() {
            Some((first, _)) => *first,
            None => return 0.0,
        };
        let elapsed = now.duration_since(first).max(Duration::from_millis(1));
        // Stale samples still inside the deque do not count; callers
        // only evict on record.
        let live = self
            .samples
            .iter()
            .filter(|(ts, _)| now.duration_since(*ts) <= self.window)
            .count();
        live as f64 / elapsed.as_secs_f64().min(self.window.as_secs_f64())
    }

    /// Frame payload throughput in bytes/second over the window.
    pub fn bytes_per_second(&self) -> u64 {
        if self.samples.len() < 2 {
            return 0;
        }
        let (first, last) = (self.samples.front().unwrap().0, self.samples.back().unwrap().0);
        let elapsed = last.duration_since(first).max(Duration::from_millis(1));
        (self.total_bytes as f64 / elapsed.as_secs_f64()) as u64
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    // ── Internal ─────────────────────────────────────────────────

    fn evict(&mut self, now: Instant) {
        while let Some(&(ts, bytes)) = self.samples.front() {
            if now.duration_since(ts) > self.window {
                self.samples.pop_front();
                self.total_bytes = self.total_bytes.saturating_sub(bytes);
            } else {
                break;
            }
        }
    }
}

impl Default for FrameRateEstimator {
    fn default() -> Self {
        Self::new()
    }
}

// ── SessionStats ─────────────────────────────────────────────────

/// Snapshot of one session's counters, cheap to copy out for display.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub frames_received: u64,
    pub textures_received: u64,
    pub fps: f64,
}

// ── Tests ────────────────────────────────────────────────────────
