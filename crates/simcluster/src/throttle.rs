//! Minimum-interval throttling for repeated actions
//!
//! Used by the leader elector to enforce a single global backoff between
//! election passes, measured in virtual time.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::clock::SimClock;

/// Enforces a minimum virtual-time gap between attempts of a named action.
pub struct ActionThrottle {
    name: &'static str,
    min_gap_ms: u64,
    clock: Arc<SimClock>,
    last_attempt_ms: Mutex<Option<u64>>,
}

impl ActionThrottle {
    pub fn new(name: &'static str, min_gap_ms: u64, clock: Arc<SimClock>) -> Self {
        Self {
            name,
            min_gap_ms,
            clock,
            last_attempt_ms: Mutex::new(None),
        }
    }

    /// Sleep (virtual time) until the minimum gap since the last attempt has
    /// elapsed. Does nothing on the first attempt.
    pub async fn minimum_wait_between_actions(&self) {
        let last = *self.last_attempt_ms.lock();
        let Some(last) = last else { return };
        let elapsed = self.clock.now_ms().saturating_sub(last);
        if elapsed < self.min_gap_ms {
            let wait = self.min_gap_ms - elapsed;
            debug!("throttling '{}' for {}ms", self.name, wait);
            self.clock.sleep(wait).await;
        }
    }

    /// Record that an attempt is starting now.
    pub fn mark_attempting_action(&self) {
        *self.last_attempt_ms.lock() = Some(self.clock.now_ms());
    }

    /// Forget the last attempt, allowing the next one to run immediately.
    pub fn reset(&self) {
        *self.last_attempt_ms.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_attempt_is_not_throttled() {
        let clock = Arc::new(SimClock::new());
        let throttle = ActionThrottle::new("test", 5000, clock.clone());
        throttle.minimum_wait_between_actions().await;
        assert_eq!(clock.now_ms(), 0);
    }

    #[tokio::test]
    async fn test_waits_out_the_minimum_gap() {
        let clock = Arc::new(SimClock::new());
        let throttle = ActionThrottle::new("test", 5000, clock.clone());

        throttle.mark_attempting_action();
        clock.sleep(1200).await;
        throttle.minimum_wait_between_actions().await;
        // 1200 elapsed, so the throttle sleeps the remaining 3800
        assert_eq!(clock.now_ms(), 5000);
    }

    #[tokio::test]
    async fn test_reset_clears_backoff() {
        let clock = Arc::new(SimClock::new());
        let throttle = ActionThrottle::new("test", 5000, clock.clone());

        throttle.mark_attempting_action();
        throttle.reset();
        throttle.minimum_wait_between_actions().await;
        assert_eq!(clock.now_ms(), 0);
    }
}
