//! Configuration Module
//!
//! Loads default caching and rate limiting parameters from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::EvictionStrategy;
use crate::limiter::RateLimitStrategy;

/// Process-wide defaults for decorators built from configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Cache entry time-to-live in milliseconds
    pub cache_ttl_ms: u64,
    /// Maximum number of cached entries (0 = unbounded)
    pub cache_max_entries: usize,
    /// Eviction policy used when the cache is full
    pub cache_eviction: EvictionStrategy,
    /// Requests allowed per window and key
    pub rate_limit_max_requests: u32,
    /// Rate limit window in milliseconds
    pub rate_limit_window_ms: u64,
    /// Rate limiting algorithm
    pub rate_limit_strategy: RateLimitStrategy,
    /// Interval of the background maintenance tasks in milliseconds
    pub cleanup_interval_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL_MS` - Cache TTL in milliseconds (default: 60000)
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `CACHE_EVICTION` - `fifo`, `lru` or `lfu` (default: lru)
    /// - `RATE_LIMIT_MAX_REQUESTS` - Requests per window (default: 10)
    /// - `RATE_LIMIT_WINDOW_MS` - Window length in milliseconds (default: 1000)
    /// - `RATE_LIMIT_STRATEGY` - `token-bucket`, `sliding-window` or `fixed-window`
    ///   (default: token-bucket)
    /// - `CLEANUP_INTERVAL_MS` - Maintenance task period (default: 1000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_ttl_ms: env_or("CACHE_TTL_MS", defaults.cache_ttl_ms),
            cache_max_entries: env_or("CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            cache_eviction: env_or("CACHE_EVICTION", defaults.cache_eviction),
            rate_limit_max_requests: env_or(
                "RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            ),
            rate_limit_window_ms: env_or("RATE_LIMIT_WINDOW_MS", defaults.rate_limit_window_ms),
            rate_limit_strategy: env_or("RATE_LIMIT_STRATEGY", defaults.rate_limit_strategy),
            cleanup_interval_ms: env_or("CLEANUP_INTERVAL_MS", defaults.cleanup_interval_ms),
        }
    }

    /// Cache TTL as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Rate limit window as a Duration.
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    /// Maintenance task period as a Duration.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 60_000,
            cache_max_entries: 1000,
            cache_eviction: EvictionStrategy::Lru,
            rate_limit_max_requests: 10,
            rate_limit_window_ms: 1000,
            rate_limit_strategy: RateLimitStrategy::TokenBucket,
            cleanup_interval_ms: 1000,
        }
    }
}

/// Reads and parses an environment variable, falling back to `default`
/// when it is unset or unparseable.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
