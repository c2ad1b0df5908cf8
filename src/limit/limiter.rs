//! The rate limiter façade.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, trace, warn};

use super::algorithm::LimitAlgorithm;
use super::decision::Decision;
use super::fixed_window::FixedWindow;
use super::leaky_bucket::LeakyBucket;
use super::sliding_counter::SlidingCounter;
use super::sliding_log::SlidingLog;
use super::token_bucket::TokenBucket;
use crate::clock::{Clock, SystemClock};
use crate::config::{AlgorithmKind, FailurePolicy, LimiterConfig};
use crate::error::{Error, Result};
use crate::store::Store;

/// Bounded optimistic-concurrency budget per decision.
const MAX_CAS_ATTEMPTS: u32 = 8;

/// The object callers embed: one configured algorithm bound to a store and
/// a clock.
///
/// The façade owns no mutable state. All per-key state lives in the store
/// and every decision is a fresh read/compare-and-swap cycle, which keeps
/// concurrent callers correct within one process and across processes when
/// the store is shared.
pub struct RateLimiter {
    algorithm: Box<dyn LimitAlgorithm>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    failure_policy: FailurePolicy,
    capacity: u64,
}

impl RateLimiter {
    /// Create a rate limiter from a validated configuration.
    ///
    /// Configuration errors surface here, never per-request.
    pub fn new(
        config: &LimiterConfig,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let window = config.window();
        let rate = config.refill_rate.unwrap_or_default();
        let algorithm: Box<dyn LimitAlgorithm> = match config.algorithm {
            AlgorithmKind::TokenBucket => Box::new(TokenBucket::new(config.capacity, rate)),
            AlgorithmKind::LeakyBucket => Box::new(LeakyBucket::new(config.capacity, rate)),
            AlgorithmKind::FixedWindow => Box::new(FixedWindow::new(config.capacity, window)),
            AlgorithmKind::SlidingLog => Box::new(SlidingLog::new(config.capacity, window)),
            AlgorithmKind::SlidingCounter => {
                Box::new(SlidingCounter::new(config.capacity, window))
            }
        };
        debug!(
            algorithm = ?config.algorithm,
            capacity = config.capacity,
            failure_policy = ?config.failure_policy,
            "creating rate limiter"
        );
        Ok(Self {
            algorithm,
            store,
            clock,
            failure_policy: config.failure_policy,
            capacity: config.capacity,
        })
    }

    /// Create a rate limiter on the system clock.
    pub fn with_system_clock(config: &LimiterConfig, store: Arc<dyn Store>) -> Result<Self> {
        Self::new(config, store, Arc::new(SystemClock))
    }

    /// The configured capacity, for header projection.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Decide whether a single-unit request for `key` is admitted.
    pub async fn decide(&self, key: &str) -> Result<Decision> {
        self.decide_cost(key, 1).await
    }

    /// Decide whether a `cost`-unit request for `key` is admitted.
    ///
    /// Store outages, timeouts, and contention exhaustion resolve into a
    /// decision according to the configured failure policy; configuration
    /// errors (zero cost, cost beyond capacity) are returned as errors.
    pub async fn decide_cost(&self, key: &str, cost: u64) -> Result<Decision> {
        if cost == 0 {
            return Err(Error::Config("cost must be positive".to_string()));
        }
        // No state can ever satisfy a request larger than the whole quota:
        // a permanent condition, not a retryable denial.
        if cost > self.capacity {
            return Err(Error::Config(format!(
                "cost {} exceeds capacity {} and can never be admitted",
                cost, self.capacity
            )));
        }

        trace!(key = %key, cost = cost, "checking rate limit");
        match self.try_decide(key, cost).await {
            Ok(decision) => {
                if !decision.allowed {
                    debug!(
                        key = %key,
                        remaining = decision.remaining,
                        retry_after = ?decision.retry_after,
                        "rate limit exceeded"
                    );
                }
                Ok(decision)
            }
            Err(error @ (Error::Config(_) | Error::Encoding(_) | Error::Io(_))) => Err(error),
            Err(error) => {
                warn!(
                    key = %key,
                    error = %error,
                    policy = ?self.failure_policy,
                    "store unavailable, applying failure policy"
                );
                let now = self.clock.now();
                Ok(match self.failure_policy {
                    FailurePolicy::FailOpen => Decision::fail_open(now),
                    FailurePolicy::FailClosed => Decision::fail_closed(now),
                })
            }
        }
    }

    /// Drop all state for a key, resetting its quota.
    pub async fn reset(&self, key: &str) -> Result<()> {
        debug!(key = %key, "resetting rate limit state");
        self.store.remove(key).await?;
        Ok(())
    }

    async fn try_decide(&self, key: &str, cost: u64) -> Result<Decision> {
        for attempt in 0..MAX_CAS_ATTEMPTS {
            // Fresh read-modify-write per attempt, including "now".
            let now = self.clock.now();
            let current = self.store.get(key).await?;
            if current.is_none() {
                debug!(key = %key, "creating rate limit state");
            }
            let outcome = self.algorithm.apply(current.as_deref(), now, cost)?;
            let swapped = self
                .store
                .compare_and_swap(
                    key,
                    current.as_deref(),
                    &outcome.state,
                    self.algorithm.state_ttl(),
                )
                .await?;
            if swapped {
                return Ok(outcome.decision);
            }

            debug!(key = %key, attempt = attempt, "compare-and-swap conflict, retrying");
            let jitter_us = rand::thread_rng().gen_range(20..200) * (attempt as u64 + 1);
            tokio::time::sleep(Duration::from_micros(jitter_us)).await;
        }
        Err(Error::Contention {
            key: key.to_string(),
            attempts: MAX_CAS_ATTEMPTS,
        })
    }
}
