//! Fixed window counter admission.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::algorithm::{decode_state, encode_state, from_micros, micros, LimitAlgorithm, Outcome};
use super::decision::Decision;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct WindowState {
    count: u64,
    window_start_us: u64,
}

/// O(1) counter over fixed, epoch-aligned windows.
///
/// Known boundary behavior: up to `2 x capacity` units can be admitted
/// within a window-length span straddling a boundary (`capacity` just
/// before it, `capacity` just after). Callers needing a strict bound
/// should pick the sliding window counter or log instead.
pub(crate) struct FixedWindow {
    capacity: u64,
    window: Duration,
}

impl FixedWindow {
    pub(crate) fn new(capacity: u64, window: Duration) -> Self {
        Self { capacity, window }
    }
}

impl LimitAlgorithm for FixedWindow {
    fn apply(&self, state: Option<&[u8]>, now: Duration, cost: u64) -> Result<Outcome> {
        let now_us = micros(now);
        let window_us = (self.window.as_micros() as u64).max(1);
        let current_start = (now_us / window_us) * window_us;

        let mut window = decode_state::<WindowState>(state).unwrap_or(WindowState {
            count: 0,
            window_start_us: current_start,
        });

        // Window rolled over: reset in place, no background timer involved.
        if window.window_start_us != current_start {
            window.count = 0;
            window.window_start_us = current_start;
        }

        let reset_at = from_micros(current_start + window_us);
        let decision = if window.count + cost <= self.capacity {
            window.count += cost;
            Decision::allow((self.capacity - window.count) as i64, reset_at)
        } else {
            Decision::deny(
                self.capacity.saturating_sub(window.count) as i64,
                reset_at,
                reset_at.saturating_sub(now),
            )
        };

        Ok(Outcome {
            state: encode_state(&window)?,
            decision,
        })
    }

    fn state_ttl(&self) -> Duration {
        self.window
    }
}
