//! Fixed-window rate limiter.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    QuotaCounter, DEFAULT_RATE_LIMIT, DEFAULT_RATE_LIMIT_PREFIX, DEFAULT_RATE_LIMIT_WINDOW_SECS,
};
use crate::clock::{Clock, SystemClock};
use crate::error::RateLimitError;

// =============================================================================
// Policy
// =============================================================================

/// Quota policy: `limit` units per identifier per fixed `window`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Units allowed per window
    pub limit: u32,

    /// Window length; windows are aligned to the Unix epoch
    pub window: Duration,

    /// Prefix for counter keys in the backing store
    pub prefix: String,
}

impl RateLimitPolicy {
    /// Create a policy with the default key prefix.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            prefix: DEFAULT_RATE_LIMIT_PREFIX.to_string(),
        }
    }

    /// Set the counter key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn window_millis(&self) -> u64 {
        u64::try_from(self.window.as_millis())
            .unwrap_or(u64::MAX)
            .max(1)
    }
}

impl Default for RateLimitPolicy {
    /// Two units per day.
    fn default() -> Self {
        Self::new(
            DEFAULT_RATE_LIMIT,
            Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        )
    }
}

// =============================================================================
// Rate Limit Info
// =============================================================================

/// Outcome of a quota check, returned to callers on every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Whether the attempted consumption was permitted
    pub success: bool,

    /// Units left in the current window (0 when rejected)
    pub remaining: u32,

    /// Units allowed per window
    pub limit: u32,

    /// Epoch milliseconds at which the current window ends
    pub reset: u64,
}

impl RateLimitInfo {
    /// Info reported when the quota could not be checked at all.
    pub fn unavailable(limit: u32) -> Self {
        Self {
            success: false,
            remaining: 0,
            limit,
            reset: 0,
        }
    }
}

// =============================================================================
// Rate Limiter
// =============================================================================

/// Fixed-window quota enforcement over a [`QuotaCounter`].
///
/// The current window index is `now / window`; the counter key is
/// `{prefix}:{identifier}:{index}`, so a counter logically resets as soon as
/// the clock crosses into the next window, whatever the store does with the
/// old key.
#[derive(Clone)]
pub struct RateLimiter {
    counter: Arc<dyn QuotaCounter>,
    policy: RateLimitPolicy,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter using the system clock.
    pub fn new(counter: Arc<dyn QuotaCounter>, policy: RateLimitPolicy) -> Self {
        Self::with_clock(counter, policy, Arc::new(SystemClock))
    }

    /// Create a limiter with an explicit clock.
    pub fn with_clock(
        counter: Arc<dyn QuotaCounter>,
        policy: RateLimitPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            counter,
            policy,
            clock,
        }
    }

    /// The policy in force.
    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Per-window quota.
    pub fn limit(&self) -> u32 {
        self.policy.limit
    }

    /// Current time according to the limiter's clock.
    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Consume one unit for `identifier` if any remain in the current window.
    pub async fn check_and_consume(
        &self,
        identifier: &str,
    ) -> Result<RateLimitInfo, RateLimitError> {
        let (key, reset) = self.current_window(identifier);
        let limit = self.policy.limit;

        let info = match self.counter.try_consume(&key, limit, reset).await? {
            Some(used) => RateLimitInfo {
                success: true,
                remaining: limit.saturating_sub(used),
                limit,
                reset,
            },
            None => RateLimitInfo {
                success: false,
                remaining: 0,
                limit,
                reset,
            },
        };

        debug!(
            identifier = identifier,
            success = info.success,
            remaining = info.remaining,
            "Quota checked"
        );

        Ok(info)
    }

    /// Report the quota for `identifier` without consuming anything.
    pub async fn peek(&self, identifier: &str) -> Result<RateLimitInfo, RateLimitError> {
        let (key, reset) = self.current_window(identifier);
        let limit = self.policy.limit;
        let used = self.counter.used(&key).await?;
        let remaining = limit.saturating_sub(used);

        Ok(RateLimitInfo {
            success: remaining > 0,
            remaining,
            limit,
            reset,
        })
    }

    /// Counter key and window end for `identifier` at the current instant.
    fn current_window(&self, identifier: &str) -> (String, u64) {
        let window = self.policy.window_millis();
        let index = self.clock.now_millis() / window;
        let reset = index.saturating_add(1).saturating_mul(window);
        let key = format!("{}:{}:{}", self.policy.prefix, identifier, index);
        (key, reset)
    }
}

// =============================================================================
// Tests
// =============================================================================
