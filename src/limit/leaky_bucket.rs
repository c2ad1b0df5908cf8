//! Leaky bucket admission.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::algorithm::{decode_state, encode_state, micros, secs_f64, LimitAlgorithm, Outcome};
use super::decision::Decision;
use crate::error::Result;

/// Per-key queue state. The level is a real number: draining at a
/// fractional rate must not round away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct QueueState {
    level: f64,
    last_leak_us: u64,
}

/// Models a constant-rate processing pipe. Admitted requests occupy queue
/// capacity and drain at `leak_rate`; unlike the token bucket, admissions
/// never speed up effective throughput.
pub(crate) struct LeakyBucket {
    capacity: u64,
    leak_rate: f64,
}

impl LeakyBucket {
    pub(crate) fn new(capacity: u64, leak_rate: f64) -> Self {
        Self {
            capacity,
            leak_rate,
        }
    }
}

impl LimitAlgorithm for LeakyBucket {
    fn apply(&self, state: Option<&[u8]>, now: Duration, cost: u64) -> Result<Outcome> {
        let now_us = micros(now);
        // A fresh key starts with an empty queue.
        let mut queue = decode_state::<QueueState>(state).unwrap_or(QueueState {
            level: 0.0,
            last_leak_us: now_us,
        });

        let elapsed_secs = now_us.saturating_sub(queue.last_leak_us) as f64 / 1e6;
        queue.level = (queue.level - elapsed_secs * self.leak_rate).max(0.0);
        queue.last_leak_us = now_us;

        let cost_f = cost as f64;
        let capacity_f = self.capacity as f64;
        let decision = if queue.level + cost_f <= capacity_f {
            queue.level += cost_f;
            let drained_at = now + secs_f64(queue.level / self.leak_rate);
            Decision::allow((capacity_f - queue.level).floor() as i64, drained_at)
        } else {
            // Persist the leaked level even when denying.
            let wait = secs_f64((queue.level + cost_f - capacity_f) / self.leak_rate);
            Decision::deny(
                (capacity_f - queue.level).floor().max(0.0) as i64,
                now + wait,
                wait,
            )
        };

        Ok(Outcome {
            state: encode_state(&queue)?,
            decision,
        })
    }

    fn state_ttl(&self) -> Duration {
        // A full queue is fully drained after capacity / leak_rate.
        secs_f64(self.capacity as f64 / self.leak_rate) + Duration::from_secs(1)
    }
}
