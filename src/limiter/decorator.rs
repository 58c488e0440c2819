//! Rate Limiting Decorator Module
//!
//! Wraps an async node with a limiter so calls over budget fail fast without
//! running the node. A `SharedRateLimiter` lets several nodes share one budget.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::KeyGenerator;
use crate::config::Config;
use crate::error::{GuardError, RateLimitExceeded, Result};
use crate::hooks::{notify, KeyHook};
use crate::limiter::{Decision, LimiterAlgorithm, LimiterStats, Quota, RateLimitStrategy};

/// Limiter key used when no key generator is configured.
pub const GLOBAL_KEY: &str = "global";

// == Rate Limit Options ==
/// Rate limiting configuration for a decorator or a shared limiter.
pub struct RateLimitOptions {
    /// Calls allowed per window and key; must be non-zero
    pub max_requests: u32,
    /// Window length; must be non-zero
    pub window: Duration,
    /// Algorithm used to track the budget
    pub strategy: RateLimitStrategy,
    on_rate_limit_exceeded: Option<KeyHook>,
    on_rate_limit_reset: Option<KeyHook>,
}

impl RateLimitOptions {
    pub fn new(max_requests: u32, window: Duration, strategy: RateLimitStrategy) -> Self {
        Self {
            max_requests,
            window,
            strategy,
            on_rate_limit_exceeded: None,
            on_rate_limit_reset: None,
        }
    }

    /// Creates options from process configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.rate_limit_max_requests,
            config.rate_limit_window(),
            config.rate_limit_strategy,
        )
    }

    /// Observer fired with the key of every denied call.
    pub fn on_rate_limit_exceeded(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_rate_limit_exceeded = Some(Arc::new(hook));
        self
    }

    /// Observer fired with the key of every explicit reset.
    pub fn on_rate_limit_reset(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_rate_limit_reset = Some(Arc::new(hook));
        self
    }

    /// Checks quota bounds.
    pub fn validate(&self) -> Result<()> {
        if self.max_requests == 0 {
            return Err(GuardError::config("max_requests must be greater than zero"));
        }
        if self.window.is_zero() {
            return Err(GuardError::config("window must be greater than zero"));
        }
        Ok(())
    }
}

// == Limiter Core ==
struct LimiterState {
    algorithm: Box<dyn LimiterAlgorithm>,
    stats: LimiterStats,
}

/// Algorithm state plus observers, shared by every decorator built from it.
struct LimiterCore {
    state: Mutex<LimiterState>,
    on_rate_limit_exceeded: Option<KeyHook>,
    on_rate_limit_reset: Option<KeyHook>,
}

impl LimiterCore {
    fn build(options: RateLimitOptions) -> Result<Self> {
        options.validate()?;

        let quota = Quota {
            max_requests: options.max_requests,
            window: options.window,
        };
        Ok(Self {
            state: Mutex::new(LimiterState {
                algorithm: options.strategy.build(quota),
                stats: LimiterStats::default(),
            }),
            on_rate_limit_exceeded: options.on_rate_limit_exceeded,
            on_rate_limit_reset: options.on_rate_limit_reset,
        })
    }

    async fn check(&self, key: &str) -> Decision {
        let decision = {
            let mut state = self.state.lock().await;
            let decision = state.algorithm.check_and_consume(key, Instant::now());
            if decision.is_allowed() {
                state.stats.allowed += 1;
            } else {
                state.stats.denied += 1;
            }
            decision
        };

        if let Decision::Denied { retry_after } = decision {
            debug!(key, ?retry_after, "Rate limit exceeded");
            if let Some(hook) = &self.on_rate_limit_exceeded {
                notify("on_rate_limit_exceeded", || hook(key));
            }
        }
        decision
    }

    async fn reset(&self, key: &str) {
        {
            let mut state = self.state.lock().await;
            state.algorithm.reset(key);
            state.stats.resets += 1;
        }
        debug!(key, "Rate limit reset");
        if let Some(hook) = &self.on_rate_limit_reset {
            notify("on_rate_limit_reset", || hook(key));
        }
    }

    async fn prune_idle(&self) -> usize {
        self.state
            .lock()
            .await
            .algorithm
            .prune_idle(Instant::now())
    }

    async fn stats(&self) -> LimiterStats {
        let state = self.state.lock().await;
        LimiterStats {
            tracked_keys: state.algorithm.tracked_keys(),
            ..state.stats.clone()
        }
    }
}

// == Shared Rate Limiter ==
/// One limiter budget pooled by several decorated nodes.
///
/// Nodes sharing a limiter draw from the same per-key budgets; with the
/// default key every call counts against `"global"`.
#[derive(Clone)]
pub struct SharedRateLimiter {
    core: Arc<LimiterCore>,
}

impl SharedRateLimiter {
    /// Creates a shared limiter, validating the options eagerly.
    pub fn new(options: RateLimitOptions) -> Result<Self> {
        Ok(Self {
            core: Arc::new(LimiterCore::build(options)?),
        })
    }

    /// Wraps a node so every call first consumes budget from this limiter.
    pub fn with_rate_limit<I, F>(&self, node: F) -> RateLimited<I, F> {
        RateLimited {
            node,
            core: Arc::clone(&self.core),
            key_generator: None,
        }
    }

    /// Consumes one unit of `key`'s budget without running a node.
    pub async fn check(&self, key: &str) -> Decision {
        self.core.check(key).await
    }

    /// Restores `key` to a full budget.
    pub async fn reset(&self, key: &str) {
        self.core.reset(key).await;
    }

    /// Drops state for keys whose budget is fully restored.
    pub async fn prune_idle(&self) -> usize {
        self.core.prune_idle().await
    }

    pub async fn stats(&self) -> LimiterStats {
        self.core.stats().await
    }
}

// == Rate Limited Node ==
/// A node throttled by a rate limiter.
pub struct RateLimited<I, F> {
    node: F,
    core: Arc<LimiterCore>,
    key_generator: Option<KeyGenerator<I>>,
}

/// Wraps `node` with its own private limiter.
///
/// # Errors
/// `GuardError::Configuration` when the options are invalid.
pub fn with_rate_limit<I, F>(node: F, options: RateLimitOptions) -> Result<RateLimited<I, F>> {
    Ok(SharedRateLimiter::new(options)?.with_rate_limit(node))
}

impl<I, F> RateLimited<I, F> {
    /// Derives the limiter key from the input instead of using `"global"`.
    pub fn key_generator(mut self, generator: impl Fn(&I) -> String + Send + Sync + 'static) -> Self {
        self.key_generator = Some(Arc::new(generator));
        self
    }

    /// Handle to the underlying limiter.
    pub fn limiter(&self) -> SharedRateLimiter {
        SharedRateLimiter {
            core: Arc::clone(&self.core),
        }
    }

    pub async fn stats(&self) -> LimiterStats {
        self.core.stats().await
    }

    // == Call ==
    /// Runs the node if the input's key has budget left.
    ///
    /// A denied call returns `RateLimitExceeded` without invoking the node.
    /// An allowed call passes the node's result through unchanged; the
    /// consumed budget is kept even if the node fails.
    pub async fn call<O, E, Fut>(&self, input: I) -> std::result::Result<O, E>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = std::result::Result<O, E>>,
        E: From<RateLimitExceeded>,
    {
        let key = match &self.key_generator {
            Some(generator) => generator(&input),
            None => GLOBAL_KEY.to_string(),
        };

        match self.core.check(&key).await {
            Decision::Allowed { .. } => (self.node)(input).await,
            Decision::Denied { retry_after } => {
                Err(E::from(RateLimitExceeded { key, retry_after }))
            }
        }
    }
}
