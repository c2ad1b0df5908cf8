//! Token bucket admission.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::algorithm::{decode_state, encode_state, micros, secs_f64, LimitAlgorithm, Outcome};
use super::decision::Decision;
use crate::error::Result;

/// Per-key bucket state. Tokens are a real number so refill never
/// accumulates rounding bias; only the reported remaining count is floored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BucketState {
    tokens: f64,
    last_refill_us: u64,
}

/// Tokens accumulate continuously at `refill_rate` up to `capacity`, so
/// bursts up to `capacity` are absorbed instantly while the long-run rate
/// stays capped.
pub(crate) struct TokenBucket {
    capacity: u64,
    refill_rate: f64,
}

impl TokenBucket {
    pub(crate) fn new(capacity: u64, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
        }
    }
}

impl LimitAlgorithm for TokenBucket {
    fn apply(&self, state: Option<&[u8]>, now: Duration, cost: u64) -> Result<Outcome> {
        let now_us = micros(now);
        // A fresh key starts with a full bucket.
        let mut bucket = decode_state::<BucketState>(state).unwrap_or(BucketState {
            tokens: self.capacity as f64,
            last_refill_us: now_us,
        });

        // Saturating elapsed: a clock that jumped backwards refills nothing.
        let elapsed_secs = now_us.saturating_sub(bucket.last_refill_us) as f64 / 1e6;
        bucket.tokens = (bucket.tokens + elapsed_secs * self.refill_rate).min(self.capacity as f64);
        bucket.last_refill_us = now_us;

        let cost_f = cost as f64;
        let decision = if bucket.tokens >= cost_f {
            bucket.tokens -= cost_f;
            let full_at = now + secs_f64((self.capacity as f64 - bucket.tokens) / self.refill_rate);
            Decision::allow(bucket.tokens.floor() as i64, full_at)
        } else {
            // The refilled (but not decremented) state is still persisted.
            let wait = secs_f64((cost_f - bucket.tokens) / self.refill_rate);
            Decision::deny(bucket.tokens.floor() as i64, now + wait, wait)
        };

        Ok(Outcome {
            state: encode_state(&bucket)?,
            decision,
        })
    }

    fn state_ttl(&self) -> Duration {
        // After time-to-full of inactivity the bucket would be at capacity
        // anyway, which is exactly how a fresh key starts.
        secs_f64(self.capacity as f64 / self.refill_rate) + Duration::from_secs(1)
    }
}
