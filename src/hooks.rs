//! Observer Hooks
//!
//! Callback types for cache and limiter events, and the isolation wrapper
//! that keeps a misbehaving observer out of the caller's control flow.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use crate::cache::{CacheEntry, CachedValue};

/// Fired on a cache hit with the key and the stored value.
pub type HitHook<V> = Arc<dyn Fn(&str, &CachedValue<V>) + Send + Sync>;

/// Fired with the key of a cache miss, a denied call or a limiter reset.
pub type KeyHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Fired with the key and entry removed by capacity eviction.
pub type EvictionHook<V> = Arc<dyn Fn(&str, &CacheEntry<V>) + Send + Sync>;

/// Runs an observer, swallowing any panic it raises.
///
/// Observers are telemetry only; a panic is logged and never reaches the caller.
pub(crate) fn notify<F: FnOnce()>(event: &'static str, observer: F) {
    if catch_unwind(AssertUnwindSafe(observer)).is_err() {
        warn!(event, "Observer panicked, ignoring");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_notify_runs_observer() {
        let calls = AtomicUsize::new(0);
        notify("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_notify_swallows_panic() {
        notify("test", || panic!("observer failure"));
        // Reaching this line is the assertion
    }
}
