//! Sliding window counter admission.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::algorithm::{decode_state, encode_state, from_micros, micros, LimitAlgorithm, Outcome};
use super::decision::Decision;
use crate::error::Result;

/// Adjacent window pair. Invariant: `curr_start_us = prev_start_us + window`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct DualWindowState {
    prev_count: u64,
    prev_start_us: u64,
    curr_count: u64,
    curr_start_us: u64,
}

/// O(1) sliding window approximation.
///
/// The previous window's count is weighted by how much of it still overlaps
/// the trailing window and added to the current count:
/// `estimated = weight * prev_count + curr_count` with
/// `weight = 1 - elapsed_in_current / window`, clamped to `[0, 1]`. This
/// removes the fixed window's boundary defect to within one window's worth
/// of slack under adversarial timing.
pub(crate) struct SlidingCounter {
    capacity: u64,
    window: Duration,
}

impl SlidingCounter {
    pub(crate) fn new(capacity: u64, window: Duration) -> Self {
        Self { capacity, window }
    }
}

impl LimitAlgorithm for SlidingCounter {
    fn apply(&self, state: Option<&[u8]>, now: Duration, cost: u64) -> Result<Outcome> {
        let now_us = micros(now);
        let window_us = (self.window.as_micros() as u64).max(1);
        let aligned_start = (now_us / window_us) * window_us;

        let mut state = decode_state::<DualWindowState>(state).unwrap_or(DualWindowState {
            prev_count: 0,
            prev_start_us: aligned_start.saturating_sub(window_us),
            curr_count: 0,
            curr_start_us: aligned_start,
        });

        // Roll forward. After a single whole window the current count
        // becomes the previous one; after a longer idle gap the stale
        // window's contribution decays to zero instead of carrying forward.
        if now_us >= state.curr_start_us + window_us {
            if now_us >= state.curr_start_us + 2 * window_us {
                state.prev_count = 0;
            } else {
                state.prev_count = state.curr_count;
            }
            state.curr_count = 0;
            state.curr_start_us = aligned_start;
            state.prev_start_us = aligned_start.saturating_sub(window_us);
        }

        let elapsed_in_current = now_us.saturating_sub(state.curr_start_us) as f64;
        let weight = (1.0 - elapsed_in_current / window_us as f64).clamp(0.0, 1.0);
        let estimated = weight * state.prev_count as f64 + state.curr_count as f64;

        let capacity_f = self.capacity as f64;
        let reset_at = from_micros(state.curr_start_us + window_us);
        let decision = if estimated + cost as f64 <= capacity_f {
            state.curr_count += cost;
            let remaining = (capacity_f - estimated - cost as f64).floor() as i64;
            Decision::allow(remaining, reset_at)
        } else {
            // Conservative hint: by the end of the current window the
            // previous window's contribution has fully decayed.
            let remaining = (capacity_f - estimated).floor().max(0.0) as i64;
            Decision::deny(remaining, reset_at, reset_at.saturating_sub(now))
        };

        Ok(Outcome {
            state: encode_state(&state)?,
            decision,
        })
    }

    fn state_ttl(&self) -> Duration {
        // The previous bucket still weighs on estimates within one idle
        // window, so state stays meaningful for two.
        self.window * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::algorithm::secs_f64;
    use super::super::fixed_window::FixedWindow;

    fn t(secs: f64) -> Duration {
        secs_f64(secs)
    }

    fn step(
        sc: &SlidingCounter,
        state: Option<Vec<u8>>,
        now: Duration,
        cost: u64,
    ) -> (Vec<u8>, Decision) {
        let outcome = sc.apply(state.as_deref(), now, cost).unwrap();
        (outcome.state, outcome.decision)
    }

    fn state_with(prev_count: u64, curr_count: u64, window_secs: u64) -> Vec<u8> {
        encode_state(&DualWindowState {
            prev_count,
            prev_start_us: 0,
            curr_count,
            curr_start_us: window_secs * 1_000_000,
        })
        .unwrap()
    }

    #[test]
    fn test_interpolated_estimate() {
        // previous window carried 80, current holds 20, 45s into a 60s
        // window: weight 0.25, estimated 0.25 * 80 + 20 = 40.
        let sc = SlidingCounter::new(100, Duration::from_secs(60));
        let state = state_with(80, 20, 60);

        let (_, decision) = step(&sc, Some(state), t(105.0), 1);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 59);
    }

    #[test]
    fn test_estimate_blocks_admission() {
        // 15s into the window: weight 0.75, estimated 0.75 * 80 + 20 = 80,
        // and a 30-unit request overflows a capacity of 100.
        let sc = SlidingCounter::new(100, Duration::from_secs(60));
        let state = state_with(80, 20, 60);

        let (_, decision) = step(&sc, Some(state), t(75.0), 30);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 20);
        assert_eq!(decision.retry_after, Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_admits_fewer_than_fixed_window_across_boundary() {
        let capacity = 100u64;
        let window = Duration::from_secs(60);
        let sc = SlidingCounter::new(capacity, window);
        let fw = FixedWindow::new(capacity, window);

        let mut sc_state = None;
        let mut fw_state = None;
        let mut sc_admitted = 0u64;
        let mut fw_admitted = 0u64;

        // Hammer both algorithms just before and just after a boundary.
        for phase in [59.9, 60.1] {
            for _ in 0..capacity {
                let now = t(phase);
                let (next, decision) = step(&sc, sc_state, now, 1);
                if decision.allowed {
                    sc_admitted += 1;
                }
                sc_state = Some(next);

                let outcome = fw.apply(fw_state.as_deref(), now, 1).unwrap();
                if outcome.decision.allowed {
                    fw_admitted += 1;
                }
                fw_state = Some(outcome.state);
            }
        }

        assert_eq!(fw_admitted, 2 * capacity);
        assert!(
            sc_admitted < fw_admitted,
            "sliding counter admitted {} vs fixed window {}",
            sc_admitted,
            fw_admitted
        );
        // Bounded error: never more than capacity plus the previous
        // window's weighted slack.
        assert!(sc_admitted <= capacity + capacity / 2);
    }

    #[test]
    fn test_stale_windows_decay_to_zero() {
        let sc = SlidingCounter::new(10, Duration::from_secs(60));
        let (state, _) = step(&sc, None, t(30.0), 10);

        // Two idle windows later, the old traffic must not count at all.
        let (state, decision) = step(&sc, Some(state), t(150.0), 10);
        assert!(decision.allowed);

        let decoded: DualWindowState = decode_state(Some(state.as_slice())).unwrap();
        assert_eq!(decoded.prev_count, 0);
        assert_eq!(decoded.curr_count, 10);
    }

    #[test]
    fn test_single_window_roll_keeps_previous() {
        let sc = SlidingCounter::new(100, Duration::from_secs(60));
        let (state, _) = step(&sc, None, t(59.0), 60);

        // 15s into the next window: weight 0.75, estimated 45.
        let (state, decision) = step(&sc, Some(state), t(75.0), 1);
        assert!(decision.allowed);
        let decoded: DualWindowState = decode_state(Some(state.as_slice())).unwrap();
        assert_eq!(decoded.prev_count, 60);
        assert_eq!(decoded.curr_count, 1);
        assert_eq!(decoded.curr_start_us, 60_000_000);
        assert_eq!(decoded.prev_start_us, 0);
        assert_eq!(decision.remaining, 54);
    }

    #[test]
    fn test_weight_clamped_under_clock_rewind() {
        let sc = SlidingCounter::new(10, Duration::from_secs(60));
        let (state, _) = step(&sc, None, t(70.0), 5);

        // The clock leaps back before the current window's start; the
        // estimate must not inflate past the raw counts.
        let (_, decision) = step(&sc, Some(state), t(50.0), 1);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4);
    }

    #[test]
    fn test_denial_is_idempotent_at_same_instant() {
        let sc = SlidingCounter::new(1, Duration::from_secs(60));
        let (state, _) = step(&sc, None, t(0.0), 1);

        let (state, first) = step(&sc, Some(state), t(10.0), 1);
        assert!(!first.allowed);
        let (_, second) = step(&sc, Some(state), t(10.0), 1);
        assert_eq!(first, second);
    }
}
