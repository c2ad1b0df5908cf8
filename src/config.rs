//! Configuration for the rate limiter.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The admission algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// Continuous token refill; absorbs bursts up to `capacity`.
    TokenBucket,
    /// Constant-rate drain; bounds sustained throughput at the leak rate.
    LeakyBucket,
    /// O(1) counter per fixed window; admits up to 2x capacity across a
    /// window boundary.
    FixedWindow,
    /// Exact trailing-window enforcement via a timestamp log; O(capacity)
    /// per call.
    SlidingLog,
    /// Weighted two-window interpolation; O(1) approximation of the
    /// sliding window.
    SlidingCounter,
}

/// Behavior when the backing store is unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Admit requests during a store outage so the outage does not take
    /// down the protected service. Remaining quota is reported as unknown.
    #[default]
    FailOpen,
    /// Deny requests during a store outage, preserving the limiting
    /// guarantee at the cost of availability.
    FailClosed,
}

/// Which store backend a deployment binds the limiter to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Single-process in-memory store.
    Memory,
    /// Shared Redis backend for distributed deployments.
    Redis {
        /// Connection URL, e.g. `redis://127.0.0.1:6379`.
        url: String,
        /// Per-operation timeout in milliseconds.
        #[serde(default = "default_op_timeout_ms")]
        op_timeout_ms: u64,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory
    }
}

fn default_op_timeout_ms() -> u64 {
    250
}

/// Main configuration for a rate limiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// The admission algorithm.
    pub algorithm: AlgorithmKind,

    /// Maximum permitted units per window, or bucket/queue size.
    pub capacity: u64,

    /// Window length in seconds (window-based algorithms).
    #[serde(default = "default_window_secs")]
    pub window_secs: f64,

    /// Refill (token bucket) or leak (leaky bucket) rate in units per
    /// second. Required for those algorithms, ignored by the rest.
    #[serde(default)]
    pub refill_rate: Option<f64>,

    /// Behavior when the store is unreachable.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Store backend binding.
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_window_secs() -> f64 {
    60.0
}

impl LimiterConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: LimiterConfig = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("failed to parse limiter config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// The configured window as a duration.
    pub fn window(&self) -> Duration {
        Duration::try_from_secs_f64(self.window_secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    /// Validate quota parameters.
    ///
    /// Called at limiter construction so configuration errors never surface
    /// per-request.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::Config("capacity must be positive".to_string()));
        }
        if !self.window_secs.is_finite() || self.window_secs <= 0.0 {
            return Err(Error::Config(format!(
                "window must be positive, got {}s",
                self.window_secs
            )));
        }
        match self.algorithm {
            AlgorithmKind::TokenBucket | AlgorithmKind::LeakyBucket => match self.refill_rate {
                Some(rate) if rate.is_finite() && rate > 0.0 => {}
                Some(rate) => {
                    return Err(Error::Config(format!(
                        "refill_rate must be positive, got {}",
                        rate
                    )))
                }
                None => {
                    return Err(Error::Config(format!(
                        "refill_rate is required for {:?}",
                        self.algorithm
                    )))
                }
            },
            _ => {}
        }
        Ok(())
    }
}
