//! Storage backends for per-key rate limit state.
//!
//! All per-key state is exclusively owned by a [`Store`]; algorithms perform
//! a fresh read-modify-write cycle on every decision. The trait exposes the
//! two atomic primitives that cycle needs: a read and a compare-and-swap
//! with expiry. An in-memory backend covers single-process deployments; the
//! Redis backend shares state across processes with identical semantics.

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis::RedisStore;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The operation did not complete within the configured timeout.
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
}

/// A key/value backend holding opaque per-key state bytes.
///
/// Implementations must guarantee that [`compare_and_swap`](Store::compare_and_swap)
/// is atomic per key and that operations on different keys never block one
/// another. The encoding of the stored bytes is the caller's concern.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch the current state for a key, if present and unexpired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Atomically replace the state for `key` with `new` if the current
    /// state equals `expected` (`None` meaning the key must be absent).
    ///
    /// Returns `true` if the swap was applied. The written state expires
    /// after `ttl`. The operation is all-or-nothing: on a conflict or an
    /// error, no partial state is left behind.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Drop any state held for `key`.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}
