//! Error types for the caching and rate limiting layer
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

// == Rate Limit Exceeded ==
/// Returned when a call is denied by a rate limiter.
///
/// The wrapped node is never invoked for a denied call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Rate limit exceeded for key '{key}' (retry after {retry_after:?})")]
pub struct RateLimitExceeded {
    /// Limiter key whose budget is exhausted
    pub key: String,
    /// Time until the key regains one unit of budget
    pub retry_after: Duration,
}

// == Cached Error ==
/// Replayable record of a node failure kept in the cache.
///
/// Only stored when error caching is enabled on the decorator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cached failure for key '{key}': {message}")]
pub struct CachedError {
    /// Cache key the failure was recorded under
    pub key: String,
    /// Display form of the original error
    pub message: String,
}

// == Guard Error Enum ==
/// Unified error type for the caching and rate limiting layer.
#[derive(Error, Debug)]
pub enum GuardError {
    /// Invalid decorator or shared instance configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Call denied by a rate limiter
    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),

    /// Replayed failure served from the cache
    #[error(transparent)]
    Cached(#[from] CachedError),

    /// Failure raised by the wrapped node itself
    #[error(transparent)]
    Node(#[from] anyhow::Error),
}

impl GuardError {
    /// Shorthand for a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        GuardError::Configuration(msg.into())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caching and rate limiting layer.
pub type Result<T> = std::result::Result<T, GuardError>;
