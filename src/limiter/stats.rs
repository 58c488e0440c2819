//! Limiter Statistics Module
//!
//! Tracks admitted and denied calls for a rate limiter.

use serde::Serialize;

/// Tracks rate limiter activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LimiterStats {
    /// Checks that consumed budget
    pub allowed: u64,
    /// Checks rejected for lack of budget
    pub denied: u64,
    /// Explicit key resets
    pub resets: u64,
    /// Keys currently holding limiter state
    pub tracked_keys: usize,
}

impl LimiterStats {
    /// Fraction of checks that were denied, or 0.0 before any check.
    pub fn denial_rate(&self) -> f64 {
        let total = self.allowed + self.denied;
        if total == 0 {
            0.0
        } else {
            self.denied as f64 / total as f64
        }
    }
}
