//! Compare-and-swap throttle windows.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// A shared throttle window claimed by at most one caller at a time.
///
/// The gate stores the last claim as epoch milliseconds (0 = never
/// claimed) and hands out a new claim only when the window has passed,
/// using compare-exchange so concurrent callers race safely: exactly
/// one wins a given window. State is monitor-local and rebuilt from
/// zero on restart; the worst case is one extra claim after a restart.
#[derive(Debug)]
pub struct ThrottleGate {
    window_ms: i64,
    last_ms: AtomicI64,
}

impl ThrottleGate {
    /// Gate that opens once per `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            window_ms: window.as_millis() as i64,
            last_ms: AtomicI64::new(0),
        }
    }

    /// True if a claim at `now_ms` would currently succeed.
    pub fn is_open(&self, now_ms: i64) -> bool {
        let last = self.last_ms.load(Ordering::Acquire);
        last == 0 || now_ms - last > self.window_ms
    }

    /// Try to claim the window at `now_ms`. Returns true for exactly
    /// one caller per window, even under concurrent invocation.
    pub fn try_claim(&self, now_ms: i64) -> bool {
        let last = self.last_ms.load(Ordering::Acquire);
        if last != 0 && now_ms - last <= self.window_ms {
            return false;
        }
        self.last_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[cfg(test)]
    pub(crate) fn force_last(&self, last_ms: i64) {
        self.last_ms.store(last_ms, Ordering::Release);
    }
}
