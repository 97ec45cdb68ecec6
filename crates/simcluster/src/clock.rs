//! Virtual time source
//!
//! All simulated delays go through [`SimClock`] so that a scenario runs in
//! accelerated, deterministic time instead of waiting on the wall clock.

use std::sync::atomic::{AtomicU64, Ordering};

/// Simulated clock. Sleeping advances the clock instead of blocking.
#[derive(Debug, Default)]
pub struct SimClock {
    now_ms: AtomicU64,
}

impl SimClock {
    /// Create a clock starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock starting at the given epoch (milliseconds).
    pub fn starting_at(epoch_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(epoch_ms),
        }
    }

    /// Current simulated time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    /// Advance simulated time by `ms` and yield to other tasks.
    pub async fn sleep(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
        tokio::task::yield_now().await;
    }
}
