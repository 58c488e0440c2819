//! Token Bucket Module
//!
//! Continuous-refill token bucket, one bucket per key.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::limiter::{Decision, LimiterAlgorithm, Quota, RateLimitStrategy};

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket limiter.
///
/// # Algorithm
/// - Capacity: `max_requests` tokens, and every bucket starts full
/// - Refill rate: `max_requests / window` tokens per millisecond
/// - Refill: `tokens = min(capacity, tokens + elapsed_ms * rate)`
/// - A check consumes one token when at least one is available
/// - A denial waits for the next whole token, never longer than one window
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_ms: f64,
    window: Duration,
    buckets: HashMap<String, Bucket>,
}

impl TokenBucket {
    pub fn new(quota: Quota) -> Self {
        let capacity = f64::from(quota.max_requests);
        let window_ms = (quota.window.as_secs_f64() * 1000.0).max(f64::MIN_POSITIVE);
        Self {
            capacity,
            refill_per_ms: capacity / window_ms,
            window: quota.window,
            buckets: HashMap::new(),
        }
    }

    fn refilled(&self, bucket: &Bucket, now: Instant) -> f64 {
        let elapsed_ms = now.saturating_duration_since(bucket.last_refill).as_secs_f64() * 1000.0;
        (bucket.tokens + elapsed_ms * self.refill_per_ms).min(self.capacity)
    }
}

impl LimiterAlgorithm for TokenBucket {
    fn check_and_consume(&mut self, key: &str, now: Instant) -> Decision {
        let capacity = self.capacity;
        let bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket {
                tokens: capacity,
                last_refill: now,
            })
            .clone();

        let mut tokens = self.refilled(&bucket, now);
        let decision = if tokens >= 1.0 {
            tokens -= 1.0;
            Decision::Allowed {
                remaining: tokens.floor() as u32,
            }
        } else {
            let wait_secs = (1.0 - tokens) / self.refill_per_ms / 1000.0;
            Decision::Denied {
                retry_after: Duration::try_from_secs_f64(wait_secs)
                    .map_or(self.window, |wait| wait.min(self.window)),
            }
        };

        self.buckets.insert(
            key.to_string(),
            Bucket {
                tokens,
                last_refill: now,
            },
        );
        decision
    }

    fn reset(&mut self, key: &str) {
        self.buckets.remove(key);
    }

    fn prune_idle(&mut self, now: Instant) -> usize {
        let before = self.buckets.len();
        let full: Vec<String> = self
            .buckets
            .iter()
            .filter(|(_, bucket)| self.refilled(bucket, now) >= self.capacity)
            .map(|(key, _)| key.clone())
            .collect();
        for key in full {
            self.buckets.remove(&key);
        }
        before - self.buckets.len()
    }

    fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }

    fn strategy(&self) -> RateLimitStrategy {
        RateLimitStrategy::TokenBucket
    }
}
