//! Sliding Window Log Module
//!
//! Keeps the exact time of every admitted request inside the trailing window.

use std::collections::{HashMap, VecDeque};

use tokio::time::Instant;

use crate::limiter::{Decision, LimiterAlgorithm, Quota, RateLimitStrategy};

/// Sliding window log limiter.
///
/// A request is admitted when fewer than `max_requests` timestamps fall
/// within the last `window`. Timestamps at least `window` old are pruned
/// before each check.
#[derive(Debug)]
pub struct SlidingWindowLog {
    quota: Quota,
    logs: HashMap<String, VecDeque<Instant>>,
}

impl SlidingWindowLog {
    pub fn new(quota: Quota) -> Self {
        Self {
            quota,
            logs: HashMap::new(),
        }
    }
}

fn prune(log: &mut VecDeque<Instant>, quota: &Quota, now: Instant) {
    while log
        .front()
        .is_some_and(|&at| now.saturating_duration_since(at) >= quota.window)
    {
        log.pop_front();
    }
}

impl LimiterAlgorithm for SlidingWindowLog {
    fn check_and_consume(&mut self, key: &str, now: Instant) -> Decision {
        let quota = self.quota;
        let log = self.logs.entry(key.to_string()).or_default();
        prune(log, &quota, now);

        let max = quota.max_requests as usize;
        if log.len() < max {
            log.push_back(now);
            return Decision::Allowed {
                remaining: (max - log.len()) as u32,
            };
        }

        let retry_after = log
            .front()
            .map(|&oldest| quota.window.saturating_sub(now.saturating_duration_since(oldest)))
            .unwrap_or(quota.window);
        Decision::Denied { retry_after }
    }

    fn reset(&mut self, key: &str) {
        self.logs.remove(key);
    }

    fn prune_idle(&mut self, now: Instant) -> usize {
        let before = self.logs.len();
        let quota = self.quota;
        self.logs.retain(|_, log| {
            prune(log, &quota, now);
            !log.is_empty()
        });
        before - self.logs.len()
    }

    fn tracked_keys(&self) -> usize {
        self.logs.len()
    }

    fn strategy(&self) -> RateLimitStrategy {
        RateLimitStrategy::SlidingWindow
    }
}
