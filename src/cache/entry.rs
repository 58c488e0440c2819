//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::CachedError;

// == Cached Value ==
/// What a cache entry holds: a node result or a replayable failure.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue<V> {
    /// Successful node output
    Ok(V),
    /// Recorded node failure (only when error caching is enabled)
    Err(CachedError),
}

impl<V> CachedValue<V> {
    /// Returns true if this value records a failure.
    pub fn is_err(&self) -> bool {
        matches!(self, CachedValue::Err(_))
    }
}

// == Cache Entry ==
/// Represents a single cache entry with value and access metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: CachedValue<V>,
    /// Insertion time
    pub inserted_at: Instant,
    /// Time of the most recent hit (insertion time until first hit)
    pub last_accessed_at: Instant,
    /// Number of hits served since this entry was last written.
    ///
    /// An overwrite starts a fresh entry, so this restarts at zero, while an
    /// LFU store keeps ranking the key by all its hits.
    pub access_count: u64,
    /// Expiration time
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry that expires `ttl` after `now`.
    pub fn new(value: CachedValue<V>, ttl: Duration, now: Instant) -> Self {
        Self {
            value,
            inserted_at: now,
            last_accessed_at: now,
            access_count: 0,
            expires_at: now + ttl,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// Boundary condition: an entry is expired once `now >= expires_at`, so it
    /// is gone as soon as the full TTL has elapsed.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Checks if the entry has expired against the current clock.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Record Access ==
    /// Updates hit metadata.
    pub fn record_access(&mut self, now: Instant) {
        self.last_accessed_at = now;
        self.access_count += 1;
    }

    // == Time To Live ==
    /// Returns the remaining TTL, or zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_entry_creation() {
        let now = Instant::now();
        let entry = CacheEntry::new(CachedValue::Ok("v"), Duration::from_secs(60), now);

        assert_eq!(entry.value, CachedValue::Ok("v"));
        assert_eq!(entry.inserted_at, now);
        assert_eq!(entry.last_accessed_at, now);
        assert_eq!(entry.access_count, 0);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new(CachedValue::Ok(1), Duration::from_millis(30), Instant::now());
        assert!(!entry.is_expired());

        sleep(Duration::from_millis(50));

        assert!(entry.is_expired());
        assert_eq!(entry.ttl_remaining(), Duration::ZERO);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Instant::now();
        let entry = CacheEntry::new(CachedValue::Ok(()), Duration::from_millis(10), now);

        assert!(!entry.is_expired_at(now + Duration::from_millis(9)));
        assert!(entry.is_expired_at(now + Duration::from_millis(10)), "Entry should be expired at boundary");
    }

    #[test]
    fn test_record_access() {
        let now = Instant::now();
        let mut entry = CacheEntry::new(CachedValue::Ok(1), Duration::from_secs(1), now);
        let later = now + Duration::from_millis(5);

        entry.record_access(later);
        entry.record_access(later);

        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_accessed_at, later);
    }

    #[test]
    fn test_cached_error_value() {
        let value: CachedValue<u8> = CachedValue::Err(CachedError {
            key: "k".to_string(),
            message: "boom".to_string(),
        });
        assert!(value.is_err());
        assert!(!CachedValue::Ok(1u8).is_err());
    }
}
