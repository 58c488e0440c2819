//! Limiter Module
//!
//! Provides per-key rate limiting with token bucket, sliding window log and
//! fixed window algorithms.

mod algorithm;
mod decorator;
mod fixed_window;
mod sliding_window;
mod stats;
mod token_bucket;

pub use algorithm::{Decision, LimiterAlgorithm, Quota, RateLimitStrategy};
pub use decorator::{
    with_rate_limit, RateLimitOptions, RateLimited, SharedRateLimiter, GLOBAL_KEY,
};
pub use fixed_window::FixedWindow;
pub use sliding_window::SlidingWindowLog;
pub use stats::LimiterStats;
pub use token_bucket::TokenBucket;
