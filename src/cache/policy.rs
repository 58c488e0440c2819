//! Eviction Policy Module
//!
//! Implements FIFO, LRU and LFU victim selection for a bounded cache store.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// == Eviction Strategy ==
/// Names the eviction algorithm a store is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionStrategy {
    /// Evict the oldest inserted entry
    Fifo,
    /// Evict the least recently used entry
    #[default]
    Lru,
    /// Evict the least frequently used entry, oldest first on ties
    Lfu,
}

impl EvictionStrategy {
    /// Builds the policy object for this strategy.
    pub fn build(self) -> Box<dyn EvictionPolicy> {
        match self {
            EvictionStrategy::Fifo => Box::new(FifoPolicy::default()),
            EvictionStrategy::Lru => Box::new(LruPolicy::default()),
            EvictionStrategy::Lfu => Box::new(LfuPolicy::default()),
        }
    }
}

impl FromStr for EvictionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(EvictionStrategy::Fifo),
            "lru" => Ok(EvictionStrategy::Lru),
            "lfu" => Ok(EvictionStrategy::Lfu),
            other => Err(format!("unknown eviction strategy '{}'", other)),
        }
    }
}

impl fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvictionStrategy::Fifo => "fifo",
            EvictionStrategy::Lru => "lru",
            EvictionStrategy::Lfu => "lfu",
        };
        f.write_str(name)
    }
}

// == Eviction Policy Trait ==
/// Bookkeeping that decides which key leaves a full store.
///
/// The store reports every insert, hit and removal; the policy only ever
/// names a victim, the store does the actual removal.
pub trait EvictionPolicy: Send + Sync + fmt::Debug {
    /// A new key entered the store.
    fn on_insert(&mut self, key: &str);

    /// An existing key was read.
    fn on_access(&mut self, key: &str);

    /// An existing key was overwritten in place. This is not a read.
    fn on_overwrite(&mut self, key: &str);

    /// A key left the store for any reason.
    fn on_remove(&mut self, key: &str);

    /// The key that should be evicted next, if any.
    fn victim(&self) -> Option<&str>;

    /// Forgets every tracked key.
    fn clear(&mut self);

    /// Number of tracked keys.
    fn len(&self) -> usize;

    /// Strategy this policy implements.
    fn strategy(&self) -> EvictionStrategy;
}

// == Rank Index ==
/// Keys ordered by an ascending rank; the smallest rank is the victim.
#[derive(Debug)]
struct RankIndex<R> {
    ranks: HashMap<String, R>,
    order: BTreeMap<R, String>,
}

impl<R> Default for RankIndex<R> {
    fn default() -> Self {
        Self {
            ranks: HashMap::new(),
            order: BTreeMap::new(),
        }
    }
}

impl<R: Ord + Copy> RankIndex<R> {
    fn rank(&self, key: &str) -> Option<R> {
        self.ranks.get(key).copied()
    }

    fn set(&mut self, key: &str, rank: R) {
        if let Some(old) = self.ranks.insert(key.to_string(), rank) {
            self.order.remove(&old);
        }
        self.order.insert(rank, key.to_string());
    }

    fn remove(&mut self, key: &str) {
        if let Some(old) = self.ranks.remove(key) {
            self.order.remove(&old);
        }
    }

    fn lowest(&self) -> Option<&str> {
        self.order.values().next().map(String::as_str)
    }

    fn clear(&mut self) {
        self.ranks.clear();
        self.order.clear();
    }

    fn len(&self) -> usize {
        self.ranks.len()
    }
}

// == FIFO ==
/// Evicts by insertion order; reads never change the order.
#[derive(Debug, Default)]
pub struct FifoPolicy {
    seq: u64,
    index: RankIndex<u64>,
}

impl EvictionPolicy for FifoPolicy {
    fn on_insert(&mut self, key: &str) {
        self.seq += 1;
        self.index.set(key, self.seq);
    }

    fn on_access(&mut self, _key: &str) {}

    fn on_overwrite(&mut self, _key: &str) {}

    fn on_remove(&mut self, key: &str) {
        self.index.remove(key);
    }

    fn victim(&self) -> Option<&str> {
        self.index.lowest()
    }

    fn clear(&mut self) {
        self.index.clear();
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn strategy(&self) -> EvictionStrategy {
        EvictionStrategy::Fifo
    }
}

// == LRU ==
/// Evicts the key whose last insert or hit is oldest.
#[derive(Debug, Default)]
pub struct LruPolicy {
    tick: u64,
    index: RankIndex<u64>,
}

impl LruPolicy {
    fn touch(&mut self, key: &str) {
        self.tick += 1;
        self.index.set(key, self.tick);
    }
}

impl EvictionPolicy for LruPolicy {
    fn on_insert(&mut self, key: &str) {
        self.touch(key);
    }

    fn on_access(&mut self, key: &str) {
        self.touch(key);
    }

    fn on_overwrite(&mut self, key: &str) {
        self.touch(key);
    }

    fn on_remove(&mut self, key: &str) {
        self.index.remove(key);
    }

    fn victim(&self) -> Option<&str> {
        self.index.lowest()
    }

    fn clear(&mut self) {
        self.index.clear();
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn strategy(&self) -> EvictionStrategy {
        EvictionStrategy::Lru
    }
}

// == LFU ==
/// Evicts the key with the fewest hits; ties go to the oldest insertion.
///
/// Rank is `(hits, insertion sequence)`, so the BTreeMap's first entry is
/// always the deterministic victim.
#[derive(Debug, Default)]
pub struct LfuPolicy {
    seq: u64,
    index: RankIndex<(u64, u64)>,
}

impl EvictionPolicy for LfuPolicy {
    fn on_insert(&mut self, key: &str) {
        self.seq += 1;
        self.index.set(key, (0, self.seq));
    }

    fn on_access(&mut self, key: &str) {
        if let Some((hits, inserted)) = self.index.rank(key) {
            self.index.set(key, (hits + 1, inserted));
        }
    }

    // Frequency counts reads only
    fn on_overwrite(&mut self, _key: &str) {}

    fn on_remove(&mut self, key: &str) {
        self.index.remove(key);
    }

    fn victim(&self) -> Option<&str> {
        self.index.lowest()
    }

    fn clear(&mut self) {
        self.index.clear();
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn strategy(&self) -> EvictionStrategy {
        EvictionStrategy::Lfu
    }
}
