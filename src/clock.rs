//! Time sources for the rate limiter.
//!
//! Algorithms never read the system clock directly. They receive "now" from
//! an injected [`Clock`], which makes every timing property testable without
//! sleeping and keeps the distributed store's TTL math on the same timeline
//! as the admission math.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A time source used by rate limiters and stores.
///
/// Time is reported as a duration since the Unix epoch. Elapsed-time
/// computations over stored timestamps must use saturating subtraction, so a
/// clock that jumps backwards yields zero elapsed time rather than negative.
pub trait Clock: Send + Sync {
    /// Returns the current time as a duration since the Unix epoch.
    fn now(&self) -> Duration;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// A manually driven clock for tests.
///
/// The time is an atomic count of microseconds behind an [`Arc`], so clones
/// all observe the same instant even as the original advances.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_us: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock starting at the given offset from the epoch.
    pub fn starting_at(now: Duration) -> Self {
        Self {
            now_us: Arc::new(AtomicU64::new(now.as_micros() as u64)),
        }
    }

    /// Advance the clock by the given amount.
    pub fn advance(&self, by: Duration) {
        self.now_us
            .fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }

    /// Set the clock to an absolute offset from the epoch.
    ///
    /// May move time backwards, which is how clock-skew handling is exercised.
    pub fn set(&self, now: Duration) {
        self.now_us.store(now.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.now_us.load(Ordering::SeqCst))
    }
}
