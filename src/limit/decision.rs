//! The decision value type returned by every rate limit check.

use std::time::Duration;

/// The outcome of a rate limit check. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request is admitted.
    pub allowed: bool,
    /// Best-effort units left in the quota; `-1` when unknown (fail-open
    /// during a store outage).
    pub remaining: i64,
    /// When the quota meaningfully refreshes, as a duration since the
    /// Unix epoch.
    pub reset_at: Duration,
    /// How long to wait before retrying. Only meaningful on denials.
    pub retry_after: Option<Duration>,
}

impl Decision {
    /// An admitted request.
    pub fn allow(remaining: i64, reset_at: Duration) -> Self {
        Self {
            allowed: true,
            remaining,
            reset_at,
            retry_after: None,
        }
    }

    /// A denied request with a retry hint.
    pub fn deny(remaining: i64, reset_at: Duration, retry_after: Duration) -> Self {
        Self {
            allowed: false,
            remaining,
            reset_at,
            retry_after: Some(retry_after),
        }
    }

    /// The admit-everything outcome for a store outage under fail-open.
    pub fn fail_open(now: Duration) -> Self {
        Self {
            allowed: true,
            remaining: -1,
            reset_at: now,
            retry_after: None,
        }
    }

    /// The deny-everything outcome for a store outage under fail-closed.
    pub fn fail_closed(now: Duration) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_at: now,
            retry_after: None,
        }
    }

    /// Project this decision onto the conventional rate limit headers an
    /// embedding gateway writes alongside a `429 Too Many Requests`.
    ///
    /// `Retry-After` is included only on denials that carry a hint, rounded
    /// up to whole seconds so a client honoring it never retries early.
    pub fn http_headers(&self, limit: u64) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("X-RateLimit-Limit", limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.max(0).to_string()),
            ("X-RateLimit-Reset", self.reset_at.as_secs().to_string()),
        ];
        if let Some(retry_after) = self.retry_after {
            let secs = retry_after.as_secs_f64().ceil() as u64;
            headers.push(("Retry-After", secs.to_string()));
        }
        headers
    }
}
