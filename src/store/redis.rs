//! Redis-backed store for distributed deployments.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::debug;

use super::{Store, StoreError};

/// Compare-and-swap executed server-side in a single round trip.
///
/// An absent key is encoded as the empty string on both sides of the
/// comparison; state encodings are never empty, so the sentinel cannot
/// collide with a real value.
const CAS_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if current == false then
  current = ''
end
if current ~= ARGV[1] then
  return 0
end
redis.call('SET', KEYS[1], ARGV[2], 'PX', ARGV[3])
return 1
"#;

/// A [`Store`] sharing per-key state through Redis.
///
/// Atomicity comes from a Lua compare-and-swap script, so concurrent
/// deciders across processes observe a single total order of writes per key.
/// Every operation is bounded by a per-operation timeout; on timeout the
/// caller's failure policy applies and no partial state is left behind.
pub struct RedisStore {
    conn: ConnectionManager,
    cas: Script,
    op_timeout: Duration,
}

impl RedisStore {
    /// Connect to a Redis backend.
    pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        debug!(url = %url, "connected to redis store");
        Ok(Self {
            conn,
            cas: Script::new(CAS_SCRIPT),
            op_timeout,
        })
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        match tokio::time::timeout(self.op_timeout, conn.get::<_, Option<Vec<u8>>>(key)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StoreError::Unavailable(e.to_string())),
            Err(_) => Err(StoreError::Timeout(self.op_timeout)),
        }
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let ttl_ms = (ttl.as_millis() as u64).max(1);
        let mut invocation = self.cas.key(key);
        invocation
            .arg(expected.unwrap_or(b""))
            .arg(new)
            .arg(ttl_ms);
        match tokio::time::timeout(self.op_timeout, invocation.invoke_async::<i64>(&mut conn)).await
        {
            Ok(Ok(swapped)) => Ok(swapped == 1),
            Ok(Err(e)) => Err(StoreError::Unavailable(e.to_string())),
            Err(_) => Err(StoreError::Timeout(self.op_timeout)),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        match tokio::time::timeout(self.op_timeout, conn.del::<_, ()>(key)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(StoreError::Unavailable(e.to_string())),
            Err(_) => Err(StoreError::Timeout(self.op_timeout)),
        }
    }
}
