//! Node Guard demo runner
//!
//! Drives two sample nodes through a shared cache and a shared rate limiter
//! and prints a JSON report of what happened.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use node_guard::cache::CacheStats;
use node_guard::limiter::LimiterStats;
use node_guard::{
    spawn_cache_cleanup, spawn_limiter_sweep, CacheOptions, Config, GuardError,
    RateLimitOptions, SharedCache, SharedRateLimiter,
};

/// Input of the sample nodes.
#[derive(Debug, Clone, Serialize)]
struct Query {
    term: String,
}

#[derive(Debug, Default, Serialize)]
struct Outcomes {
    succeeded: u64,
    rate_limited: u64,
    failed: u64,
}

#[derive(Debug, Serialize)]
struct Report {
    generated_at: String,
    outcomes: Outcomes,
    cache: CacheStats,
    limiter: LimiterStats,
}

const TERMS: [&str; 6] = ["rust", "tokio", "serde", "rust", "tracing", "rust"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "node_guard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: ttl={}ms, max_entries={}, eviction={}, limit={}/{}ms ({})",
        config.cache_ttl_ms,
        config.cache_max_entries,
        config.cache_eviction,
        config.rate_limit_max_requests,
        config.rate_limit_window_ms,
        config.rate_limit_strategy
    );

    let cache: SharedCache<String> = SharedCache::new(
        CacheOptions::from_config(&config)
            .on_eviction(|key, _| debug!(key, "Evicted")),
    )?;
    let limiter = SharedRateLimiter::new(
        RateLimitOptions::from_config(&config)
            .on_rate_limit_exceeded(|key| warn!(key, "Throttled")),
    )?;

    let cleanup_handle = spawn_cache_cleanup(cache.clone(), config.cleanup_interval());
    let sweep_handle = spawn_limiter_sweep(limiter.clone(), config.cleanup_interval());

    // Both nodes spend from the same limiter budget and store into the same cache
    let lookup = Arc::new(limiter.with_rate_limit::<Query, _>(|query: Query| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok::<String, GuardError>(format!("{} results", query.term.len() * 7))
    }));
    let summarize = Arc::new(limiter.with_rate_limit::<Query, _>(|query: Query| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<String, GuardError>(format!("summary of '{}'", query.term))
    }));

    let cached_lookup = cache.with_cache::<Query, _>(move |query: Query| {
        let lookup = Arc::clone(&lookup);
        async move { lookup.call(query).await }
    });
    let cached_summarize = cache.with_cache_keyed(
        move |query: Query| {
            let summarize = Arc::clone(&summarize);
            async move { summarize.call(query).await }
        },
        |query: &Query| format!("summary:{}", query.term),
    );

    let workload = async {
        let mut outcomes = Outcomes::default();
        for term in TERMS {
            let query = Query {
                term: term.to_string(),
            };
            for result in [
                cached_lookup.call(query.clone()).await,
                cached_summarize.call(query).await,
            ] {
                match result {
                    Ok(output) => {
                        debug!(term, output = %output, "Node succeeded");
                        outcomes.succeeded += 1;
                    }
                    Err(GuardError::RateLimited(err)) => {
                        debug!(term, retry_after = ?err.retry_after, "Node throttled");
                        outcomes.rate_limited += 1;
                    }
                    Err(err) => {
                        warn!(term, error = %err, "Node failed");
                        outcomes.failed += 1;
                    }
                }
            }
        }
        outcomes
    };

    let outcomes = tokio::select! {
        outcomes = workload => outcomes,
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, stopping workload");
            Outcomes::default()
        }
    };

    cleanup_handle.abort();
    sweep_handle.abort();

    let report = Report {
        generated_at: chrono::Utc::now().to_rfc3339(),
        outcomes,
        cache: cache.stats().await,
        limiter: limiter.stats().await,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
