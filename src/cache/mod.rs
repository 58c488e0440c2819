//! Cache Module
//!
//! Provides result memoization with TTL expiration and FIFO/LRU/LFU eviction.

mod decorator;
mod entry;
mod policy;
mod stats;
mod store;


// Re-export public types
pub use decorator::{
    stable_key, with_cache, with_cache_keyed, CacheOptions, Cached, KeyGenerator, SharedCache,
};
pub use entry::{CacheEntry, CachedValue};
pub use policy::{EvictionPolicy, EvictionStrategy, FifoPolicy, LfuPolicy, LruPolicy};
pub use stats::CacheStats;
pub use store::CacheStore;
