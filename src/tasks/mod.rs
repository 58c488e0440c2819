//! Background Tasks Module
//!
//! Periodic maintenance for shared caches and limiters.
//!
//! # Tasks
//! - Cache cleanup: removes expired entries ahead of lazy expiry
//! - Limiter sweep: drops per-key state that has returned to a full budget

mod cleanup;

pub use cleanup::{spawn_cache_cleanup, spawn_limiter_sweep};
