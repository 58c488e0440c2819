//! Limiter Algorithm Module
//!
//! The per-key check-and-consume contract shared by every rate limiting algorithm.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::limiter::{FixedWindow, SlidingWindowLog, TokenBucket};

// == Quota ==
/// Budget of `max_requests` calls per `window`, per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub max_requests: u32,
    pub window: Duration,
}

// == Decision ==
/// Outcome of a single check-and-consume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// The call may proceed; one unit of budget was consumed.
    Allowed {
        /// Whole units of budget left for the key
        remaining: u32,
    },
    /// Budget exhausted; nothing was consumed.
    Denied {
        /// Time until the key regains one unit of budget
        retry_after: Duration,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

// == Rate Limit Strategy ==
/// Names the algorithm a limiter is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimitStrategy {
    /// Continuous refill, bursts up to the full quota
    #[default]
    TokenBucket,
    /// Exact log of request times over a trailing window
    SlidingWindow,
    /// Counter reset at the start of each window
    FixedWindow,
}

impl RateLimitStrategy {
    /// Builds the algorithm object for this strategy.
    pub fn build(self, quota: Quota) -> Box<dyn LimiterAlgorithm> {
        match self {
            RateLimitStrategy::TokenBucket => Box::new(TokenBucket::new(quota)),
            RateLimitStrategy::SlidingWindow => Box::new(SlidingWindowLog::new(quota)),
            RateLimitStrategy::FixedWindow => Box::new(FixedWindow::new(quota)),
        }
    }
}

impl FromStr for RateLimitStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "token-bucket" => Ok(RateLimitStrategy::TokenBucket),
            "sliding-window" => Ok(RateLimitStrategy::SlidingWindow),
            "fixed-window" => Ok(RateLimitStrategy::FixedWindow),
            other => Err(format!("unknown rate limit strategy '{}'", other)),
        }
    }
}

impl fmt::Display for RateLimitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RateLimitStrategy::TokenBucket => "token-bucket",
            RateLimitStrategy::SlidingWindow => "sliding-window",
            RateLimitStrategy::FixedWindow => "fixed-window",
        };
        f.write_str(name)
    }
}

// == Limiter Algorithm Trait ==
/// Per-key rate limiting state machine.
///
/// Key state is created lazily on the first check and lives until `reset`
/// or `prune_idle` drops it.
pub trait LimiterAlgorithm: Send + Sync + fmt::Debug {
    /// Consumes one unit of the key's budget if available.
    fn check_and_consume(&mut self, key: &str, now: Instant) -> Decision;

    /// Restores the key to a full budget.
    fn reset(&mut self, key: &str);

    /// Drops key state that is indistinguishable from fresh state at `now`.
    ///
    /// Returns how many keys were dropped. Never changes a future decision.
    fn prune_idle(&mut self, now: Instant) -> usize;

    /// Number of keys with live state.
    fn tracked_keys(&self) -> usize;

    fn strategy(&self) -> RateLimitStrategy;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "token-bucket".parse::<RateLimitStrategy>(),
            Ok(RateLimitStrategy::TokenBucket)
        );
        assert_eq!(
            "Sliding_Window".parse::<RateLimitStrategy>(),
            Ok(RateLimitStrategy::SlidingWindow)
        );
        assert_eq!(
            "fixed-window".parse::<RateLimitStrategy>(),
            Ok(RateLimitStrategy::FixedWindow)
        );
        assert!("leaky-bucket".parse::<RateLimitStrategy>().is_err());
    }

    #[test]
    fn test_strategy_round_trips_through_display() {
        for strategy in [
            RateLimitStrategy::TokenBucket,
            RateLimitStrategy::SlidingWindow,
            RateLimitStrategy::FixedWindow,
        ] {
            assert_eq!(strategy.to_string().parse::<RateLimitStrategy>(), Ok(strategy));
            let quota = Quota {
                max_requests: 1,
                window: Duration::from_secs(1),
            };
            assert_eq!(strategy.build(quota).strategy(), strategy);
        }
    }

    #[test]
    fn test_strategy_deserialize() {
        let strategy: RateLimitStrategy = serde_json::from_str("\"fixed-window\"").unwrap();
        assert_eq!(strategy, RateLimitStrategy::FixedWindow);
    }

    #[test]
    fn test_decision_is_allowed() {
        assert!(Decision::Allowed { remaining: 0 }.is_allowed());
        assert!(!Decision::Denied {
            retry_after: Duration::ZERO
        }
        .is_allowed());
    }
}
