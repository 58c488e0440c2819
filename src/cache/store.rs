//! Cache Store Module
//!
//! Bounded key/entry map combining TTL expiration with a pluggable eviction policy.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, CachedValue, EvictionPolicy, EvictionStrategy};
use crate::hooks::{notify, EvictionHook};

// == Cache Store ==
/// Cache storage with policy-driven eviction and lazy TTL expiry.
///
/// Invariant: `len() <= max_size` whenever a bound is set. An expired entry
/// may still sit in the map but is never returned.
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Victim selection bookkeeping
    policy: Box<dyn EvictionPolicy>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries, None = unbounded
    max_size: Option<usize>,
    /// Observer for capacity evictions
    on_eviction: Option<EvictionHook<V>>,
}

impl<V> CacheStore<V> {
    // == Constructor ==
    /// Creates a new store.
    ///
    /// # Arguments
    /// * `max_size` - Maximum number of entries; `None` or `Some(0)` means unbounded
    /// * `strategy` - Eviction algorithm used once the store is full
    pub fn new(max_size: Option<usize>, strategy: EvictionStrategy) -> Self {
        Self {
            entries: HashMap::new(),
            policy: strategy.build(),
            stats: CacheStats::new(),
            max_size: max_size.filter(|&n| n > 0),
            on_eviction: None,
        }
    }

    /// Registers an observer fired for every capacity eviction.
    pub fn with_eviction_hook(mut self, hook: EvictionHook<V>) -> Self {
        self.on_eviction = Some(hook);
        self
    }

    // == Set ==
    /// Stores a value under `key` for `ttl`.
    ///
    /// A zero TTL stores nothing. Overwriting an existing key replaces the
    /// entry in place. Inserting a new key into a full store first evicts
    /// exactly one entry chosen by the policy.
    pub fn set(&mut self, key: String, value: CachedValue<V>, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }

        let now = Instant::now();
        if self.entries.contains_key(&key) {
            self.entries
                .insert(key.clone(), CacheEntry::new(value, ttl, now));
            self.policy.on_overwrite(&key);
            return;
        }

        if let Some(max) = self.max_size {
            if self.entries.len() >= max {
                self.evict_one();
            }
        }

        self.entries
            .insert(key.clone(), CacheEntry::new(value, ttl, now));
        self.policy.on_insert(&key);
        self.stats.set_total_entries(self.entries.len());
    }

    // == Evict ==
    fn evict_one(&mut self) {
        let Some(victim) = self.policy.victim().map(str::to_string) else {
            return;
        };
        self.policy.on_remove(&victim);

        if let Some(entry) = self.entries.remove(&victim) {
            self.stats.record_eviction();
            debug!(
                key = %victim,
                strategy = %self.policy.strategy(),
                "Evicted cache entry"
            );
            if let Some(hook) = &self.on_eviction {
                notify("on_eviction", || hook(victim.as_str(), &entry));
            }
        }
    }

    // == Delete ==
    /// Removes an entry by key. Returns true if it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.policy.on_remove(key);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }

    // == Contains ==
    /// Returns true if a live entry exists, without touching access metadata.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    // == Clear ==
    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.policy.clear();
        self.stats.set_total_entries(0);
    }

    // == Purge Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.entries.remove(key);
            self.policy.on_remove(key);
        }

        self.stats.record_expirations(expired_keys.len());
        self.stats.set_total_entries(self.entries.len());
        expired_keys.len()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Physical number of entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    pub fn strategy(&self) -> EvictionStrategy {
        self.policy.strategy()
    }

    #[cfg(test)]
    pub(crate) fn tracked_len(&self) -> usize {
        self.policy.len()
    }
}

impl<V: Clone> CacheStore<V> {
    // == Get ==
    /// Retrieves a live value by key.
    ///
    /// An expired entry is removed on the spot and reported as a miss. A hit
    /// updates the entry's access metadata and the eviction policy.
    pub fn get(&mut self, key: &str) -> Option<CachedValue<V>> {
        let now = Instant::now();

        let expired = match self.entries.get_mut(key) {
            None => {
                self.stats.record_miss();
                return None;
            }
            Some(entry) if entry.is_expired_at(now) => true,
            Some(entry) => {
                entry.record_access(now);
                false
            }
        };

        if expired {
            self.entries.remove(key);
            self.policy.on_remove(key);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            self.stats.set_total_entries(self.entries.len());
            debug!(key, "Cache entry expired");
            return None;
        }

        self.policy.on_access(key);
        self.stats.record_hit();
        self.entries.get(key).map(|entry| entry.value.clone())
    }
}

impl<V> fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("len", &self.entries.len())
            .field("max_size", &self.max_size)
            .field("policy", &self.policy)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
