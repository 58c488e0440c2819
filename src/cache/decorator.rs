//! Caching Decorator Module
//!
//! Wraps an async node with a cache store, memoizing results per input key.
//! A `SharedCache` lets several nodes draw from one store and one eviction budget.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStats, CacheStore, CachedValue, EvictionStrategy};
use crate::config::Config;
use crate::error::{CachedError, GuardError, Result};
use crate::hooks::{notify, EvictionHook, HitHook, KeyHook};

/// Maps a node input to its cache key.
pub type KeyGenerator<I> = Arc<dyn Fn(&I) -> String + Send + Sync>;

/// How a decorated node derives keys, fixed when the node is wrapped.
enum KeySource<I> {
    /// `stable_key` of the input; `None` when it cannot be serialized
    Serialized(fn(&I) -> Option<String>),
    /// Caller-supplied key function
    Custom(KeyGenerator<I>),
}

// == Cache Options ==
/// Caching configuration for a decorator or a shared cache.
pub struct CacheOptions<V> {
    /// Time-to-live of every stored result; must be non-zero
    pub ttl: Duration,
    /// Maximum number of entries (None = unbounded); must be at least 1 when set
    pub max_size: Option<usize>,
    /// Eviction algorithm (default: LRU)
    pub eviction: EvictionStrategy,
    /// Store node failures and replay them on later hits (default: false)
    pub cache_errors: bool,
    on_cache_hit: Option<HitHook<V>>,
    on_cache_miss: Option<KeyHook>,
    on_eviction: Option<EvictionHook<V>>,
}

impl<V> CacheOptions<V> {
    /// Creates options with the given TTL and defaults for everything else.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            max_size: None,
            eviction: EvictionStrategy::default(),
            cache_errors: false,
            on_cache_hit: None,
            on_cache_miss: None,
            on_eviction: None,
        }
    }

    /// Creates options from process configuration.
    pub fn from_config(config: &Config) -> Self {
        let mut options = Self::new(config.cache_ttl()).eviction(config.cache_eviction);
        if config.cache_max_entries > 0 {
            options.max_size = Some(config.cache_max_entries);
        }
        options
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    pub fn eviction(mut self, strategy: EvictionStrategy) -> Self {
        self.eviction = strategy;
        self
    }

    pub fn cache_errors(mut self, enabled: bool) -> Self {
        self.cache_errors = enabled;
        self
    }

    /// Observer fired on every hit.
    pub fn on_cache_hit(
        mut self,
        hook: impl Fn(&str, &CachedValue<V>) + Send + Sync + 'static,
    ) -> Self {
        self.on_cache_hit = Some(Arc::new(hook));
        self
    }

    /// Observer fired on every miss, before the node runs.
    pub fn on_cache_miss(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_cache_miss = Some(Arc::new(hook));
        self
    }

    /// Observer fired for every capacity eviction.
    pub fn on_eviction(
        mut self,
        hook: impl Fn(&str, &CacheEntry<V>) + Send + Sync + 'static,
    ) -> Self {
        self.on_eviction = Some(Arc::new(hook));
        self
    }

    /// Checks TTL and capacity bounds.
    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(GuardError::config("ttl must be greater than zero"));
        }
        if self.max_size == Some(0) {
            return Err(GuardError::config("max_size must be at least 1"));
        }
        Ok(())
    }
}

// == Cache Core ==
/// Store plus per-call settings, shared by every decorator built from it.
struct CacheCore<V> {
    store: Mutex<CacheStore<V>>,
    ttl: Duration,
    cache_errors: bool,
    on_cache_hit: Option<HitHook<V>>,
    on_cache_miss: Option<KeyHook>,
}

impl<V> CacheCore<V> {
    fn build(options: CacheOptions<V>) -> Result<Self> {
        options.validate()?;

        let mut store = CacheStore::new(options.max_size, options.eviction);
        if let Some(hook) = options.on_eviction {
            store = store.with_eviction_hook(hook);
        }

        Ok(Self {
            store: Mutex::new(store),
            ttl: options.ttl,
            cache_errors: options.cache_errors,
            on_cache_hit: options.on_cache_hit,
            on_cache_miss: options.on_cache_miss,
        })
    }
}

// == Shared Cache ==
/// One cache store pooled by several decorated nodes.
///
/// Nodes sharing a cache also share its key space: equal keys from
/// different nodes hit the same entry.
pub struct SharedCache<V> {
    core: Arc<CacheCore<V>>,
}

impl<V> Clone for SharedCache<V> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<V> SharedCache<V> {
    /// Creates a shared cache, validating the options eagerly.
    pub fn new(options: CacheOptions<V>) -> Result<Self> {
        Ok(Self {
            core: Arc::new(CacheCore::build(options)?),
        })
    }

    /// Wraps a node so it reads from and writes to this cache, keyed by the
    /// serialized input.
    pub fn with_cache<I, F>(&self, node: F) -> Cached<I, V, F>
    where
        I: Serialize,
    {
        Cached {
            node,
            core: Arc::clone(&self.core),
            key_source: KeySource::Serialized(serialized_key::<I>),
        }
    }

    /// Wraps a node keyed by `generator` alone. The input type needs no
    /// `Serialize` impl.
    pub fn with_cache_keyed<I, F>(
        &self,
        node: F,
        generator: impl Fn(&I) -> String + Send + Sync + 'static,
    ) -> Cached<I, V, F> {
        Cached {
            node,
            core: Arc::clone(&self.core),
            key_source: KeySource::Custom(Arc::new(generator)),
        }
    }

    /// Physical number of stored entries.
    pub async fn size(&self) -> usize {
        self.core.store.lock().await.len()
    }

    pub async fn clear(&self) {
        self.core.store.lock().await.clear();
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.core.store.lock().await.delete(key)
    }

    /// Removes expired entries; returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        self.core.store.lock().await.purge_expired()
    }

    pub async fn stats(&self) -> CacheStats {
        self.core.store.lock().await.stats()
    }
}

// == Cached Node ==
/// A node memoized through a cache store.
pub struct Cached<I, V, F> {
    node: F,
    core: Arc<CacheCore<V>>,
    key_source: KeySource<I>,
}

/// Wraps `node` with its own private cache.
///
/// # Errors
/// `GuardError::Configuration` when the options are invalid.
pub fn with_cache<I, V, F>(node: F, options: CacheOptions<V>) -> Result<Cached<I, V, F>>
where
    I: Serialize,
{
    Ok(SharedCache::new(options)?.with_cache(node))
}

/// Like [`with_cache`], keyed by `generator` instead of the serialized input.
pub fn with_cache_keyed<I, V, F>(
    node: F,
    options: CacheOptions<V>,
    generator: impl Fn(&I) -> String + Send + Sync + 'static,
) -> Result<Cached<I, V, F>> {
    Ok(SharedCache::new(options)?.with_cache_keyed(node, generator))
}

impl<I, V, F> Cached<I, V, F> {
    /// Replaces the default serialized-input key with a custom key function.
    pub fn key_generator(mut self, generator: impl Fn(&I) -> String + Send + Sync + 'static) -> Self {
        self.key_source = KeySource::Custom(Arc::new(generator));
        self
    }

    /// Handle to the underlying store.
    pub fn cache(&self) -> SharedCache<V> {
        SharedCache {
            core: Arc::clone(&self.core),
        }
    }

    pub async fn stats(&self) -> CacheStats {
        self.core.store.lock().await.stats()
    }
}

impl<I, V, F> Cached<I, V, F>
where
    V: Clone,
{
    // == Call ==
    /// Returns the cached result for `input`, running the node only on a miss.
    ///
    /// On a hit the node is never invoked. On a miss the node's success is
    /// stored. Its failure is stored only when error caching is on, and the
    /// original error is returned either way.
    ///
    /// A replayed failure is not the node's error value: only its `Display`
    /// text is kept, and it comes back as `Err(E::from(CachedError))`. With
    /// `GuardError` as `E` that is the `GuardError::Cached` variant, whatever
    /// variant the node first returned.
    pub async fn call<E, Fut>(&self, input: I) -> std::result::Result<V, E>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: Display + From<CachedError>,
    {
        let Some(key) = self.cache_key(&input) else {
            return (self.node)(input).await;
        };

        let cached = self.core.store.lock().await.get(&key);
        if let Some(value) = cached {
            debug!(key = %key, "Cache hit");
            if let Some(hook) = &self.core.on_cache_hit {
                notify("on_cache_hit", || hook(key.as_str(), &value));
            }
            return match value {
                CachedValue::Ok(output) => Ok(output),
                CachedValue::Err(failure) => Err(E::from(failure)),
            };
        }

        debug!(key = %key, "Cache miss");
        if let Some(hook) = &self.core.on_cache_miss {
            notify("on_cache_miss", || hook(key.as_str()));
        }

        match (self.node)(input).await {
            Ok(output) => {
                self.core
                    .store
                    .lock()
                    .await
                    .set(key, CachedValue::Ok(output.clone()), self.core.ttl);
                Ok(output)
            }
            Err(err) => {
                if self.core.cache_errors {
                    let failure = CachedError {
                        key: key.clone(),
                        message: err.to_string(),
                    };
                    self.core
                        .store
                        .lock()
                        .await
                        .set(key, CachedValue::Err(failure), self.core.ttl);
                }
                Err(err)
            }
        }
    }

    fn cache_key(&self, input: &I) -> Option<String> {
        match &self.key_source {
            KeySource::Serialized(key_of) => key_of(input),
            KeySource::Custom(generator) => Some(generator(input)),
        }
    }
}

fn serialized_key<I: Serialize>(input: &I) -> Option<String> {
    match stable_key(input) {
        Ok(key) => Some(key),
        Err(err) => {
            warn!(error = %err, "Input is not serializable, bypassing cache");
            None
        }
    }
}

// == Stable Key ==
/// Serializes an input into a deterministic cache key.
///
/// Object fields are emitted in sorted order, so structurally equal inputs
/// map to the same key regardless of field declaration order.
pub fn stable_key<T: Serialize + ?Sized>(input: &T) -> serde_json::Result<String> {
    Ok(serde_json::to_value(input)?.to_string())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_options_defaults() {
        let options: CacheOptions<u32> = CacheOptions::new(Duration::from_secs(1));
        assert_eq!(options.max_size, None);
        assert_eq!(options.eviction, EvictionStrategy::Lru);
        assert!(!options.cache_errors);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_validation() {
        let zero_ttl: CacheOptions<u32> = CacheOptions::new(Duration::ZERO);
        assert!(matches!(zero_ttl.validate(), Err(GuardError::Configuration(_))));

        let zero_size: CacheOptions<u32> = CacheOptions::new(Duration::from_secs(1)).max_size(0);
        assert!(matches!(zero_size.validate(), Err(GuardError::Configuration(_))));
    }

    #[test]
    fn test_options_from_config() {
        let config = Config {
            cache_max_entries: 0,
            cache_eviction: EvictionStrategy::Fifo,
            ..Config::default()
        };
        let options: CacheOptions<u32> = CacheOptions::from_config(&config);
        assert_eq!(options.ttl, Duration::from_secs(60));
        assert_eq!(options.max_size, None);
        assert_eq!(options.eviction, EvictionStrategy::Fifo);
    }

    #[test]
    fn test_with_cache_rejects_invalid_options() {
        let result: Result<Cached<u32, u32, _>> = with_cache(
            |x: u32| async move { Ok::<u32, GuardError>(x) },
            CacheOptions::new(Duration::ZERO),
        );
        assert!(matches!(result, Err(GuardError::Configuration(_))));
    }

    #[test]
    fn test_stable_key_sorts_fields() {
        let mut a = HashMap::new();
        a.insert("zeta", 1);
        a.insert("alpha", 2);
        let key = stable_key(&a).unwrap();
        assert_eq!(key, r#"{"alpha":2,"zeta":1}"#);
        assert_eq!(stable_key(&("x", 3)).unwrap(), r#"["x",3]"#);
    }

    #[test]
    fn test_stable_key_rejects_non_string_map_keys() {
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple key");
        assert!(stable_key(&map).is_err());
    }

    #[tokio::test]
    async fn test_unserializable_input_bypasses_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let node = with_cache(
            move |_input: HashMap<(u8, u8), u8>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<u8, GuardError>(1)
                }
            },
            CacheOptions::new(Duration::from_secs(60)),
        )
        .unwrap();

        let mut input = HashMap::new();
        input.insert((1, 1), 1);
        node.call(input.clone()).await.unwrap();
        node.call(input).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(node.cache().size().await, 0);
    }

    #[tokio::test]
    async fn test_custom_key_generator() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let node = with_cache(
            move |input: (String, u32)| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<u32, GuardError>(input.1)
                }
            },
            CacheOptions::new(Duration::from_secs(60)),
        )
        .unwrap()
        .key_generator(|input: &(String, u32)| input.0.clone());

        assert_eq!(node.call(("user".to_string(), 1)).await.unwrap(), 1);
        // Same key, different payload: served from cache
        assert_eq!(node.call(("user".to_string(), 2)).await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Holds a handle that has no serde representation.
    struct Session {
        user: String,
        _conn: Arc<AtomicUsize>,
    }

    #[tokio::test]
    async fn test_keyed_cache_accepts_non_serializable_input() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let node = with_cache_keyed(
            move |session: Session| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<String, GuardError>(format!("profile of {}", session.user))
                }
            },
            CacheOptions::new(Duration::from_secs(60)),
            |session: &Session| session.user.clone(),
        )
        .unwrap();

        let conn = Arc::new(AtomicUsize::new(0));
        let session = |user: &str| Session {
            user: user.to_string(),
            _conn: conn.clone(),
        };

        assert_eq!(node.call(session("ada")).await.unwrap(), "profile of ada");
        assert_eq!(node.call(session("ada")).await.unwrap(), "profile of ada");
        assert_eq!(node.call(session("bob")).await.unwrap(), "profile of bob");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(node.cache().size().await, 2);
    }

    #[tokio::test]
    async fn test_replayed_failure_keeps_message_only() {
        let node = with_cache(
            |x: u32| async move { Err::<u32, GuardError>(GuardError::config(format!("bad input {}", x))) },
            CacheOptions::new(Duration::from_secs(60)).cache_errors(true),
        )
        .unwrap();

        let first = node.call(7).await.unwrap_err();
        assert!(matches!(first, GuardError::Configuration(_)));

        match node.call(7).await.unwrap_err() {
            GuardError::Cached(replayed) => assert_eq!(replayed.message, first.to_string()),
            other => panic!("expected a replayed failure, got {:?}", other),
        }
    }
}
