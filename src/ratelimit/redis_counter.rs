//! Redis-backed quota counter.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use super::QuotaCounter;
use crate::error::RateLimitError;

/// Consume one unit only while below the limit; set the expiry on first use.
///
/// KEYS[1] = counter key, ARGV[1] = limit, ARGV[2] = expiry (epoch millis).
/// Returns the used count after consumption, or -1 when the limit is reached.
const CONSUME_SCRIPT: &str = r#"
local used = tonumber(redis.call('GET', KEYS[1]) or '0')
if used >= tonumber(ARGV[1]) then
  return -1
end
used = redis.call('INCR', KEYS[1])
if used == 1 then
  redis.call('PEXPIREAT', KEYS[1], ARGV[2])
end
return used
"#;

/// Quota counter stored in Redis.
///
/// The test-and-increment runs as a Lua script, which Redis executes
/// atomically, so concurrent requests from any number of replicas are
/// serialized per key.
#[derive(Clone)]
pub struct RedisQuotaCounter {
    conn: ConnectionManager,
    script: Script,
}

impl RedisQuotaCounter {
    /// Create a counter over an established connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            script: Script::new(CONSUME_SCRIPT),
        }
    }
}

#[async_trait]
impl QuotaCounter for RedisQuotaCounter {
    async fn try_consume(
        &self,
        key: &str,
        limit: u32,
        expires_at_millis: u64,
    ) -> Result<Option<u32>, RateLimitError> {
        let mut conn = self.conn.clone();
        let used: i64 = self
            .script
            .key(key)
            .arg(limit)
            .arg(expires_at_millis)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| RateLimitError::Unavailable(e.to_string()))?;

        if used < 0 {
            return Ok(None);
        }

        u32::try_from(used)
            .map(Some)
            .map_err(|_| RateLimitError::Protocol(format!("counter out of range: {}", used)))
    }

    async fn used(&self, key: &str) -> Result<u32, RateLimitError> {
        let mut conn = self.conn.clone();
        let used: Option<u32> = conn
            .get(key)
            .await
            .map_err(|e| RateLimitError::Unavailable(e.to_string()))?;
        Ok(used.unwrap_or(0))
    }
}
