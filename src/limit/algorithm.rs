//! The algorithm contract shared by all admission strategies.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::decision::Decision;
use crate::error::Result;

/// The result of applying one decision: the state to persist and the
/// decision to return.
#[derive(Debug)]
pub(crate) struct Outcome {
    pub state: Vec<u8>,
    pub decision: Decision,
}

/// An admission strategy.
///
/// `apply` is a pure function of the persisted state, the current time, and
/// the request cost; it holds no state of its own between calls. The façade
/// wraps it in a read/compare-and-swap cycle, so implementations must not
/// assume their output was actually persisted.
pub(crate) trait LimitAlgorithm: Send + Sync {
    /// Compute the next state and the decision for one request.
    ///
    /// `state` is the stored bytes for the key, or `None` on first touch.
    /// `now` is a duration since the Unix epoch. `cost` has already been
    /// validated as `1..=capacity`.
    fn apply(&self, state: Option<&[u8]>, now: Duration, cost: u64) -> Result<Outcome>;

    /// How long persisted state stays meaningful after a write.
    ///
    /// After this much inactivity, recreating the state fresh is equivalent
    /// to having kept it, so the store may expire it.
    fn state_ttl(&self) -> Duration;
}

/// Decode stored state, treating undecodable bytes as absent.
pub(crate) fn decode_state<T: DeserializeOwned>(bytes: Option<&[u8]>) -> Option<T> {
    bytes.and_then(|b| serde_json::from_slice(b).ok())
}

/// Encode state for storage.
pub(crate) fn encode_state<T: Serialize>(state: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(state)?)
}

/// Microseconds since the Unix epoch, the resolution persisted state uses.
pub(crate) fn micros(at: Duration) -> u64 {
    at.as_micros() as u64
}

/// The inverse of [`micros`].
pub(crate) fn from_micros(us: u64) -> Duration {
    Duration::from_micros(us)
}

/// A nonnegative number of seconds as a duration. NaN maps to zero,
/// overflow saturates.
pub(crate) fn secs_f64(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}
