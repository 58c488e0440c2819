//! Integration Tests for the Caching Decorator
//!
//! Drives decorated nodes end to end under a paused tokio clock.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use node_guard::{
    with_cache, with_rate_limit, CacheOptions, Cached, CachedValue, EvictionStrategy, GuardError,
    RateLimitOptions, RateLimitStrategy, SharedCache,
};
use tokio_test::{assert_err, assert_ok};

// == Helper Functions ==

type NodeFuture = Pin<Box<dyn Future<Output = node_guard::Result<String>> + Send>>;

/// Node that succeeds with a value derived from its input.
fn echo_node(calls: Arc<AtomicUsize>) -> impl Fn(String) -> NodeFuture {
    move |input: String| -> NodeFuture {
        let calls = calls.clone();
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<String, GuardError>(format!("processed {}", input))
        })
    }
}

/// Node that always fails.
fn failing_node(calls: Arc<AtomicUsize>) -> impl Fn(String) -> NodeFuture {
    move |input: String| -> NodeFuture {
        let calls = calls.clone();
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<String, GuardError>(anyhow::anyhow!("node failed for {}", input).into())
        })
    }
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

fn count(calls: &Arc<AtomicUsize>) -> usize {
    calls.load(Ordering::SeqCst)
}

const TTL: Duration = Duration::from_millis(1000);

// == Memoization ==

#[tokio::test(start_paused = true)]
async fn test_identical_calls_within_ttl_run_node_once() {
    let calls = counter();
    let node = assert_ok!(with_cache(echo_node(calls.clone()), CacheOptions::new(TTL)));

    let first = assert_ok!(node.call("test".to_string()).await);
    for _ in 0..5 {
        assert_eq!(assert_ok!(node.call("test".to_string()).await), first);
    }

    assert_eq!(count(&calls), 1);
    assert_eq!(first, "processed test");
    let stats = node.stats().await;
    assert_eq!(stats.hits, 5);
    assert_eq!(stats.misses, 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_runs_node_again_once() {
    let calls = counter();
    let node = assert_ok!(with_cache(echo_node(calls.clone()), CacheOptions::new(TTL)));

    assert_ok!(node.call("test".to_string()).await);
    tokio::time::sleep(TTL).await;

    assert_ok!(node.call("test".to_string()).await);
    assert_ok!(node.call("test".to_string()).await);

    assert_eq!(count(&calls), 2);
}

// == Eviction ==

#[tokio::test(start_paused = true)]
async fn test_fifo_evicts_first_inserted() {
    let calls = counter();
    let node = assert_ok!(with_cache(
        echo_node(calls.clone()),
        CacheOptions::new(TTL).max_size(2).eviction(EvictionStrategy::Fifo),
    ));

    for key in ["test1", "test2", "test3"] {
        assert_ok!(node.call(key.to_string()).await);
    }
    assert_eq!(count(&calls), 3);

    assert_ok!(node.call("test1".to_string()).await);
    assert_eq!(count(&calls), 4, "test1 should have been evicted");
}

#[tokio::test(start_paused = true)]
async fn test_lru_evicts_least_recently_used() {
    let calls = counter();
    let node = assert_ok!(with_cache(
        echo_node(calls.clone()),
        CacheOptions::new(TTL).max_size(2).eviction(EvictionStrategy::Lru),
    ));

    assert_ok!(node.call("test1".to_string()).await);
    assert_ok!(node.call("test2".to_string()).await);
    assert_ok!(node.call("test1".to_string()).await);
    assert_ok!(node.call("test3".to_string()).await);
    assert_eq!(count(&calls), 3);

    assert_ok!(node.call("test1".to_string()).await);
    assert_eq!(count(&calls), 3, "test1 should still be cached");

    assert_ok!(node.call("test2".to_string()).await);
    assert_eq!(count(&calls), 4, "test2 should have been evicted");
}

#[tokio::test(start_paused = true)]
async fn test_lfu_evicts_least_frequently_used() {
    let calls = counter();
    let node = assert_ok!(with_cache(
        echo_node(calls.clone()),
        CacheOptions::new(TTL).max_size(2).eviction(EvictionStrategy::Lfu),
    ));

    assert_ok!(node.call("test1".to_string()).await);
    assert_ok!(node.call("test2".to_string()).await);
    assert_ok!(node.call("test1".to_string()).await);
    assert_ok!(node.call("test1".to_string()).await);
    assert_ok!(node.call("test3".to_string()).await);

    assert_ok!(node.call("test1".to_string()).await);
    assert_eq!(count(&calls), 3, "test1 should still be cached");

    assert_ok!(node.call("test2".to_string()).await);
    assert_eq!(count(&calls), 4, "test2 should have been evicted");
}

// == Error Caching ==

#[tokio::test(start_paused = true)]
async fn test_errors_not_cached_by_default() {
    let calls = counter();
    let node = assert_ok!(with_cache(failing_node(calls.clone()), CacheOptions::new(TTL)));

    let err = assert_err!(node.call("test".to_string()).await);
    assert!(matches!(err, GuardError::Node(_)));
    assert_err!(node.call("test".to_string()).await);

    assert_eq!(count(&calls), 2);
    assert_eq!(node.cache().size().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cached_errors_are_replayed() {
    let calls = counter();
    let node = assert_ok!(with_cache(
        failing_node(calls.clone()),
        CacheOptions::new(TTL).cache_errors(true),
    ));

    let first = assert_err!(node.call("test".to_string()).await);
    assert!(matches!(first, GuardError::Node(_)));

    match node.call("test".to_string()).await {
        Err(GuardError::Cached(cached)) => {
            assert_eq!(cached.message, "node failed for test");
        }
        other => panic!("expected cached error, got {:?}", other),
    }
    assert_eq!(count(&calls), 1);
}

// == Shared Cache ==

#[tokio::test(start_paused = true)]
async fn test_shared_cache_pools_capacity() {
    let cache = assert_ok!(SharedCache::new(CacheOptions::new(TTL).max_size(2)));
    let calls_a = counter();
    let calls_b = counter();
    let node_a = cache
        .with_cache(echo_node(calls_a.clone()))
        .key_generator(|input: &String| format!("a:{}", input));
    let node_b = cache
        .with_cache(echo_node(calls_b.clone()))
        .key_generator(|input: &String| format!("b:{}", input));

    assert_ok!(node_a.call("x".to_string()).await);
    assert_ok!(node_b.call("x".to_string()).await);
    assert_eq!(cache.size().await, 2);

    // A third key from either node evicts from the shared budget
    assert_ok!(node_b.call("y".to_string()).await);
    assert_eq!(cache.size().await, 2);
    assert_eq!(cache.stats().await.evictions, 1);

    cache.clear().await;
    assert_eq!(cache.size().await, 0);
    assert_ok!(node_b.call("y".to_string()).await);
    assert_eq!(count(&calls_b), 3);
}

#[tokio::test(start_paused = true)]
async fn test_shared_cache_overlapping_keys_share_results() {
    let cache = assert_ok!(SharedCache::new(CacheOptions::new(TTL)));
    let calls_a = counter();
    let calls_b = counter();
    let node_a = cache.with_cache(echo_node(calls_a.clone()));
    let node_b = cache.with_cache(echo_node(calls_b.clone()));

    assert_ok!(node_a.call("same".to_string()).await);
    let shared = assert_ok!(node_b.call("same".to_string()).await);

    assert_eq!(shared, "processed same");
    assert_eq!(count(&calls_b), 0, "node_b should be served node_a's result");
}

// == Observers ==

#[tokio::test(start_paused = true)]
async fn test_observers_fire() {
    let hits = counter();
    let misses = counter();
    let evictions = counter();
    let (h, m, e) = (hits.clone(), misses.clone(), evictions.clone());

    let node = assert_ok!(with_cache(
        echo_node(counter()),
        CacheOptions::new(TTL)
            .max_size(1)
            .on_cache_hit(move |_, value: &CachedValue<String>| {
                assert!(!value.is_err());
                h.fetch_add(1, Ordering::SeqCst);
            })
            .on_cache_miss(move |_| {
                m.fetch_add(1, Ordering::SeqCst);
            })
            .on_eviction(move |key, _| {
                assert_eq!(key, "\"a\"");
                e.fetch_add(1, Ordering::SeqCst);
            }),
    ));

    assert_ok!(node.call("a".to_string()).await);
    assert_ok!(node.call("a".to_string()).await);
    assert_ok!(node.call("b".to_string()).await);

    assert_eq!(count(&hits), 1);
    assert_eq!(count(&misses), 2);
    assert_eq!(count(&evictions), 1);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_observer_does_not_fail_call() {
    let calls = counter();
    let node = assert_ok!(with_cache(
        echo_node(calls.clone()),
        CacheOptions::new(TTL)
            .on_cache_hit(|_, _| panic!("hit observer"))
            .on_cache_miss(|_| panic!("miss observer")),
    ));

    assert_ok!(node.call("a".to_string()).await);
    assert_eq!(assert_ok!(node.call("a".to_string()).await), "processed a");
    assert_eq!(count(&calls), 1);
}

// == Composition ==

#[tokio::test(start_paused = true)]
async fn test_cache_hits_do_not_consume_rate_limit() {
    let calls = counter();
    let limited = Arc::new(assert_ok!(with_rate_limit(
        echo_node(calls.clone()),
        RateLimitOptions::new(1, Duration::from_secs(60), RateLimitStrategy::TokenBucket),
    )));
    let inner = limited.clone();
    let node = assert_ok!(with_cache(
        move |input: String| {
            let inner = inner.clone();
            async move { inner.call(input).await }
        },
        CacheOptions::new(TTL),
    ));

    for _ in 0..3 {
        assert_ok!(node.call("a".to_string()).await);
    }
    let err = assert_err!(node.call("b".to_string()).await);
    assert!(matches!(err, GuardError::RateLimited(_)));

    assert_eq!(count(&calls), 1);
    assert_eq!(limited.stats().await.allowed, 1);
}

#[test]
fn test_invalid_cache_configuration_fails_fast() {
    let result: node_guard::Result<Cached<String, String, _>> =
        with_cache(echo_node(counter()), CacheOptions::new(Duration::ZERO));
    assert!(matches!(result, Err(GuardError::Configuration(_))));

    let result = SharedCache::<String>::new(CacheOptions::new(TTL).max_size(0));
    assert!(matches!(result, Err(GuardError::Configuration(_))));
}
