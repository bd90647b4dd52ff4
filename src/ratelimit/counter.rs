//! Quota counter backing stores.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::error::RateLimitError;

/// Atomic fixed-window counter primitive.
///
/// Implementations must perform the limit test and the increment as a single
/// atomic step. Keys are opaque to the store; the limiter encodes the window
/// into the key, so a store only needs to expire a key once its window ends.
#[async_trait]
pub trait QuotaCounter: Send + Sync {
    /// Consume one unit under `key` if fewer than `limit` units are used.
    ///
    /// Returns the number of used units after consumption, or `None` if the
    /// limit was already reached. A rejected attempt does not change the count.
    /// `expires_at_millis` is the epoch-millisecond instant at which the key may
    /// be dropped.
    async fn try_consume(
        &self,
        key: &str,
        limit: u32,
        expires_at_millis: u64,
    ) -> Result<Option<u32>, RateLimitError>;

    /// Number of units used under `key` (0 when the key is unknown).
    async fn used(&self, key: &str) -> Result<u32, RateLimitError>;
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    used: u32,
    expires_at: u64,
}

/// In-process quota counter.
///
/// Counts live only as long as the process and are not shared between
/// replicas. Suitable for development and tests.
pub struct MemoryQuotaCounter {
    slots: Mutex<HashMap<String, Slot>>,
    clock: Arc<dyn Clock>,
}

impl MemoryQuotaCounter {
    /// Create a counter using the system clock for expiry.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a counter that expires keys according to `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = self.clock.now_millis();
        let slots = self.slots.lock().await;
        slots.values().filter(|s| s.expires_at > now).count()
    }

    /// Returns `true` if no key is live.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryQuotaCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuotaCounter for MemoryQuotaCounter {
    async fn try_consume(
        &self,
        key: &str,
        limit: u32,
        expires_at_millis: u64,
    ) -> Result<Option<u32>, RateLimitError> {
        let now = self.clock.now_millis();
        let mut slots = self.slots.lock().await;

        slots.retain(|_, slot| slot.expires_at > now);

        let slot = slots.entry(key.to_string()).or_insert(Slot {
            used: 0,
            expires_at: expires_at_millis,
        });

        if slot.used >= limit {
            return Ok(None);
        }

        slot.used += 1;
        Ok(Some(slot.used))
    }

    async fn used(&self, key: &str) -> Result<u32, RateLimitError> {
        let now = self.clock.now_millis();
        let slots = self.slots.lock().await;
        Ok(slots
            .get(key)
            .filter(|slot| slot.expires_at > now)
            .map(|slot| slot.used)
            .unwrap_or(0))
    }
}
