//! Per-identifier quota enforcement over fixed time windows.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              RateLimiter                │
//! │  window math, key layout, RateLimitInfo │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          QuotaCounter Trait             │
//! │  (atomic consume-if-below-limit)        │
//! └────────────────────┬────────────────────┘
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │ RedisQuota-     │    │ MemoryQuotaCounter  │
//! │ Counter         │    │ (single process)    │
//! └─────────────────┘    └─────────────────────┘
//! ```
//!
//! The read-modify-write on a counter always happens inside the backing store,
//! never as a separate read then write in this crate, so two concurrent callers
//! cannot both take the last unit.

mod counter;
mod identifier;
mod limiter;
mod redis_counter;

pub use counter::{MemoryQuotaCounter, QuotaCounter};
pub use identifier::{client_identifier, ANONYMOUS_IDENTIFIER};
pub use limiter::{RateLimitInfo, RateLimitPolicy, RateLimiter};
pub use redis_counter::RedisQuotaCounter;

/// Default number of generations per identifier per window.
pub const DEFAULT_RATE_LIMIT: u32 = 2;

/// Default window length in seconds (one day).
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Default key prefix for quota counters.
pub const DEFAULT_RATE_LIMIT_PREFIX: &str = "christmas-photo";
