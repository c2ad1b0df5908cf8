//! In-memory store for single-process deployments.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::trace;

use super::{Store, StoreError};
use crate::clock::{Clock, SystemClock};

/// How often expired entries are swept out, at most.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct StoredEntry {
    bytes: Vec<u8>,
    /// Expiry deadline as a duration since the Unix epoch.
    expires_at: Duration,
}

/// An in-process [`Store`] backed by a sharded concurrent map.
///
/// Compare-and-swap runs under the per-key shard guard, so the
/// read-modify-write cycle for one key is atomic while operations on other
/// keys proceed independently. Expired entries are treated as absent on read
/// and physically dropped by an interval-gated sweep.
pub struct MemoryStore {
    entries: DashMap<String, StoredEntry>,
    clock: Arc<dyn Clock>,
    last_sweep: Mutex<Duration>,
}

impl MemoryStore {
    /// Create a store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store on an injected clock.
    ///
    /// The limiter and its store should share one clock so TTL expiry and
    /// admission math agree on "now".
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            entries: DashMap::new(),
            clock,
            last_sweep: Mutex::new(now),
        }
    }

    /// Number of keys currently held, including not-yet-swept expired ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn maybe_sweep(&self, now: Duration) {
        {
            let mut last = self.last_sweep.lock();
            if now.saturating_sub(*last) < SWEEP_INTERVAL {
                return;
            }
            *last = now;
        }
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        trace!(
            swept = before - self.entries.len(),
            remaining = self.entries.len(),
            "swept expired rate limit state"
        );
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = self.clock.now();
        self.maybe_sweep(now);
        Ok(self
            .entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.bytes.clone()))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let entry = StoredEntry {
            bytes: new.to_vec(),
            expires_at: now.saturating_add(ttl),
        };
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                let live = occupied.get().expires_at > now;
                let current = live.then(|| occupied.get().bytes.as_slice());
                if current == expected {
                    occupied.insert(entry);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            MapEntry::Vacant(vacant) => {
                if expected.is_none() {
                    vacant.insert(entry);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store_with_manual_clock() -> (MemoryStore, ManualClock) {
        let clock = ManualClock::starting_at(Duration::from_secs(1_000_000));
        let store = MemoryStore::with_clock(Arc::new(clock.clone()));
        (store, clock)
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let (store, _clock) = store_with_manual_clock();
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cas_insert_and_get() {
        let (store, _clock) = store_with_manual_clock();

        let swapped = store
            .compare_and_swap("k", None, b"v1", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(swapped);
        assert_eq!(store.get("k").await.unwrap(), Some(b"v1".to_vec()));
    }

    #[tokio::test]
    async fn test_cas_rejects_stale_expectation() {
        let (store, _clock) = store_with_manual_clock();
        store
            .compare_and_swap("k", None, b"v1", Duration::from_secs(60))
            .await
            .unwrap();

        // Expecting absence fails once the key exists.
        let swapped = store
            .compare_and_swap("k", None, b"v2", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(!swapped);

        // Expecting the wrong bytes fails.
        let swapped = store
            .compare_and_swap("k", Some(b"other"), b"v2", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(!swapped);

        // Expecting the current bytes succeeds.
        let swapped = store
            .compare_and_swap("k", Some(b"v1"), b"v2", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(swapped);
        assert_eq!(store.get("k").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent() {
        let (store, clock) = store_with_manual_clock();
        store
            .compare_and_swap("k", None, b"v1", Duration::from_secs(10))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(11));
        assert_eq!(store.get("k").await.unwrap(), None);

        // An expired entry counts as absent for CAS purposes too.
        let swapped = store
            .compare_and_swap("k", None, b"v2", Duration::from_secs(10))
            .await
            .unwrap();
        assert!(swapped);
    }

    #[tokio::test]
    async fn test_remove() {
        let (store, _clock) = store_with_manual_clock();
        store
            .compare_and_swap("k", None, b"v1", Duration::from_secs(60))
            .await
            .unwrap();

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sweep_drops_expired_entries() {
        let (store, clock) = store_with_manual_clock();
        store
            .compare_and_swap("short", None, b"v", Duration::from_secs(5))
            .await
            .unwrap();
        store
            .compare_and_swap("long", None, b"v", Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(store.len(), 2);

        clock.advance(SWEEP_INTERVAL + Duration::from_secs(1));
        store.get("unrelated").await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (store, _clock) = store_with_manual_clock();
        store
            .compare_and_swap("a", None, b"1", Duration::from_secs(60))
            .await
            .unwrap();
        store
            .compare_and_swap("b", None, b"2", Duration::from_secs(60))
            .await
            .unwrap();

        store.remove("a").await.unwrap();
        assert_eq!(store.get("b").await.unwrap(), Some(b"2".to_vec()));
    }
}
