//! Node Guard - memoization and rate limiting for async units of work
//!
//! Wraps async node functions with a TTL cache (FIFO/LRU/LFU eviction) and
//! per-key rate limiting (token bucket, sliding window log, fixed window).
//! Shared instances let several nodes pool one cache or one budget.

pub mod cache;
pub mod config;
pub mod error;
pub mod hooks;
pub mod limiter;
pub mod tasks;

pub use cache::{
    with_cache, with_cache_keyed, CacheOptions, Cached, CachedValue, EvictionStrategy, SharedCache,
};
pub use config::Config;
pub use error::{CachedError, GuardError, RateLimitExceeded, Result};
pub use limiter::{
    with_rate_limit, Decision, RateLimitOptions, RateLimitStrategy, RateLimited,
    SharedRateLimiter,
};
pub use tasks::{spawn_cache_cleanup, spawn_limiter_sweep};
