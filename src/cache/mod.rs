//! Bounded container cache
//!
//! # Invariants
//!
//! - Item count and memory estimate stay under their ceilings after a
//!   sweep, except for pinned entries
//! - The disposer never runs while the cache lock is held

mod managed;

pub use managed::{CacheConfig, CacheStatus, CacheValue, ManagedCache};
