//! Sliding window log admission.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::algorithm::{decode_state, encode_state, from_micros, micros, LimitAlgorithm, Outcome};
use super::decision::Decision;
use crate::error::Result;

/// One admitted call. `weight` carries the call's cost, so a multi-unit
/// request is a single weighted entry rather than `cost` duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LogEntry {
    at_us: u64,
    weight: u64,
}

/// Timestamps of admitted calls within the trailing window, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct LogState {
    entries: Vec<LogEntry>,
}

/// Exact trailing-window enforcement: every decision prunes entries older
/// than `now - window` and counts what remains. No boundary defect, at
/// O(capacity) memory and pruning cost per key per call.
pub(crate) struct SlidingLog {
    capacity: u64,
    window: Duration,
}

impl SlidingLog {
    pub(crate) fn new(capacity: u64, window: Duration) -> Self {
        Self { capacity, window }
    }
}

impl LimitAlgorithm for SlidingLog {
    fn apply(&self, state: Option<&[u8]>, now: Duration, cost: u64) -> Result<Outcome> {
        let now_us = micros(now);
        let window_us = (self.window.as_micros() as u64).max(1);

        let mut log = decode_state::<LogState>(state).unwrap_or_default();
        // Invariant after pruning: every entry lies in [now - window, now].
        log.entries
            .retain(|entry| entry.at_us + window_us > now_us);

        let used: u64 = log.entries.iter().map(|entry| entry.weight).sum();
        let decision = if used + cost <= self.capacity {
            log.entries.push(LogEntry {
                at_us: now_us,
                weight: cost,
            });
            let refresh_at = log
                .entries
                .first()
                .map(|oldest| from_micros(oldest.at_us + window_us))
                .unwrap_or(now);
            Decision::allow((self.capacity - used - cost) as i64, refresh_at)
        } else {
            // Denied until the oldest entry ages out of the window.
            let oldest_out = log
                .entries
                .first()
                .map(|oldest| from_micros(oldest.at_us + window_us))
                .unwrap_or(now);
            Decision::deny(
                self.capacity.saturating_sub(used) as i64,
                oldest_out,
                oldest_out.saturating_sub(now),
            )
        };

        Ok(Outcome {
            state: encode_state(&log)?,
            decision,
        })
    }

    fn state_ttl(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::algorithm::secs_f64;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn t(secs: f64) -> Duration {
        secs_f64(secs)
    }

    fn step(
        log: &SlidingLog,
        state: Option<Vec<u8>>,
        now: Duration,
        cost: u64,
    ) -> (Vec<u8>, Decision) {
        let outcome = log.apply(state.as_deref(), now, cost).unwrap();
        (outcome.state, outcome.decision)
    }

    #[test]
    fn test_admits_up_to_capacity_then_denies() {
        let log = SlidingLog::new(3, Duration::from_secs(60));
        let mut state = None;

        for i in 0..3 {
            let (next, decision) = step(&log, state, t(i as f64), 1);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, 2 - i as i64);
            state = Some(next);
        }

        // Oldest entry (t=0) ages out at t=60.
        let (_, decision) = step(&log, state, t(10.0), 1);
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after, Some(Duration::from_secs(50)));
    }

    #[test]
    fn test_aged_out_entries_free_capacity() {
        let log = SlidingLog::new(2, Duration::from_secs(10));
        let (state, _) = step(&log, None, t(0.0), 1);
        let (state, _) = step(&log, Some(state), t(1.0), 1);

        let (state, decision) = step(&log, Some(state), t(5.0), 1);
        assert!(!decision.allowed);

        // t=0 entry is out of the trailing window at t=10.5.
        let (state, decision) = step(&log, Some(state), t(10.5), 1);
        assert!(decision.allowed);

        let decoded: LogState = decode_state(Some(state.as_slice())).unwrap();
        assert_eq!(decoded.entries.len(), 2);
    }

    #[test]
    fn test_weighted_entry_for_multi_unit_cost() {
        let log = SlidingLog::new(10, Duration::from_secs(60));
        let (state, decision) = step(&log, None, t(0.0), 7);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 3);

        let decoded: LogState = decode_state(Some(state.as_slice())).unwrap();
        assert_eq!(decoded.entries.len(), 1);
        assert_eq!(decoded.entries[0].weight, 7);

        let (_, decision) = step(&log, Some(state), t(1.0), 4);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 3);
    }

    #[test]
    fn test_every_trailing_span_holds_at_most_capacity() {
        // Randomized timestamp injection: admit what the log allows, then
        // check the invariant over every trailing window position.
        let capacity = 10u64;
        let window = Duration::from_secs(60);
        let log = SlidingLog::new(capacity, window);
        let mut rng = StdRng::seed_from_u64(42);

        let mut at = 0.0f64;
        let mut state = None;
        let mut admitted_us: Vec<u64> = Vec::new();

        for _ in 0..500 {
            at += rng.gen_range(0.05..2.0);
            let now = t(at);
            let (next, decision) = step(&log, state, now, 1);
            if decision.allowed {
                admitted_us.push(micros(now));
            }
            state = Some(next);
        }
        assert!(admitted_us.len() > capacity as usize);

        let window_us = window.as_micros() as u64;
        for (i, &start) in admitted_us.iter().enumerate() {
            let in_span = admitted_us[i..]
                .iter()
                .take_while(|&&ts| ts < start + window_us)
                .count() as u64;
            assert!(
                in_span <= capacity,
                "span starting at {}us holds {} admits",
                start,
                in_span
            );
        }
    }

    #[test]
    fn test_denial_is_idempotent_at_same_instant() {
        let log = SlidingLog::new(1, Duration::from_secs(60));
        let (state, _) = step(&log, None, t(0.0), 1);

        let (state, first) = step(&log, Some(state), t(5.0), 1);
        assert!(!first.allowed);
        let (_, second) = step(&log, Some(state), t(5.0), 1);
        assert_eq!(first, second);
    }
}
