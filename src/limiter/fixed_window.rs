//! Fixed Window Module
//!
//! Counts requests per key in back-to-back windows anchored at the first request.

use std::collections::HashMap;

use tokio::time::Instant;

use crate::limiter::{Decision, LimiterAlgorithm, Quota, RateLimitStrategy};

#[derive(Debug, Clone, Copy)]
struct Window {
    start: Instant,
    count: u32,
}

/// Fixed window counter limiter.
///
/// Once `window` has elapsed since `start`, the window restarts at the
/// current request with a zero count.
#[derive(Debug)]
pub struct FixedWindow {
    quota: Quota,
    windows: HashMap<String, Window>,
}

impl FixedWindow {
    pub fn new(quota: Quota) -> Self {
        Self {
            quota,
            windows: HashMap::new(),
        }
    }
}

impl LimiterAlgorithm for FixedWindow {
    fn check_and_consume(&mut self, key: &str, now: Instant) -> Decision {
        let quota = self.quota;
        let window = self.windows.entry(key.to_string()).or_insert(Window {
            start: now,
            count: 0,
        });

        let elapsed = now.saturating_duration_since(window.start);
        if elapsed >= quota.window {
            *window = Window {
                start: now,
                count: 0,
            };
        }

        if window.count < quota.max_requests {
            window.count += 1;
            Decision::Allowed {
                remaining: quota.max_requests - window.count,
            }
        } else {
            Decision::Denied {
                retry_after: quota
                    .window
                    .saturating_sub(now.saturating_duration_since(window.start)),
            }
        }
    }

    fn reset(&mut self, key: &str) {
        self.windows.remove(key);
    }

    fn prune_idle(&mut self, now: Instant) -> usize {
        let before = self.windows.len();
        let span = self.quota.window;
        self.windows
            .retain(|_, window| now.saturating_duration_since(window.start) < span);
        before - self.windows.len()
    }

    fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    fn strategy(&self) -> RateLimitStrategy {
        RateLimitStrategy::FixedWindow
    }
}
