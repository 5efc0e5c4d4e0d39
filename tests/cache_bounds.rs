//! Cache ceiling tests
//!
//! Sweeps bring the cache back under its count and memory ceilings while
//! leaving checked-out containers alone.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use searchd::cache::{CacheConfig, ManagedCache};
use searchd::container::StoredContainer;
use searchd::engine::{EngineConfig, SearchEngine, WriteMode};
use searchd::Container;

// =============================================================================
// Test Utilities
// =============================================================================

fn stored(uid: u32) -> Arc<StoredContainer> {
    Arc::new(StoredContainer::new(Container::with_uid(uid, "entry")))
}

fn key(uid: u32) -> [u8; 4] {
    uid.to_be_bytes()
}

fn config(max_items: usize, max_memory: usize) -> CacheConfig {
    CacheConfig {
        max_items,
        max_memory,
        timeout: Duration::from_secs(300),
    }
}

// =============================================================================
// Direct Cache Sweeps
// =============================================================================

#[test]
fn test_sweep_enforces_item_ceiling() {
    let cache: ManagedCache<Arc<StoredContainer>> = ManagedCache::new(config(10, usize::MAX));
    for uid in 1..=50 {
        cache.put(&key(uid), stored(uid), 64).unwrap();
    }
    assert_eq!(cache.len(), 50);

    let evicted = cache.sweep();
    assert_eq!(evicted, 40);
    assert!(cache.len() <= 10);
}

#[test]
fn test_sweep_enforces_memory_ceiling() {
    let cache: ManagedCache<Arc<StoredContainer>> = ManagedCache::new(config(1000, 4096));
    for uid in 1..=32 {
        cache.put(&key(uid), stored(uid), 512).unwrap();
    }
    cache.sweep();
    assert!(cache.status().memory <= 4096);
}

#[test]
fn test_pinned_entries_survive_sweep() {
    let cache: ManagedCache<Arc<StoredContainer>> = ManagedCache::new(config(4, usize::MAX));
    let mut guards = Vec::new();
    for uid in 1..=20 {
        let value = stored(uid);
        if uid <= 6 {
            guards.push(value.pin());
        }
        cache.put(&key(uid), value, 32).unwrap();
    }

    cache.sweep();
    assert!(cache.len() <= 4 + guards.len());
    for uid in 1..=6 {
        assert!(cache.contains(&key(uid)), "pinned uid {} was evicted", uid);
    }

    drop(guards);
    cache.sweep();
    assert!(cache.len() <= 4);
}

#[test]
fn test_disposer_receives_evicted_values() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&disposed);
    let cache: ManagedCache<Arc<StoredContainer>> =
        ManagedCache::with_disposer(config(3, usize::MAX), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    for uid in 1..=8 {
        cache.put(&key(uid), stored(uid), 16).unwrap();
    }

    let evicted = cache.sweep();
    assert_eq!(disposed.load(Ordering::SeqCst), evicted);
    assert_eq!(cache.len() + evicted, 8);
}

// =============================================================================
// Engine Worker
// =============================================================================

#[test]
fn test_engine_worker_settles_under_ceiling() {
    let config = EngineConfig::default().with_cache_limits(8, 1024, 300);
    let engine = SearchEngine::new(config).expect("Failed to create engine");
    engine.new_domain("bulk", "Bulk").unwrap();

    for n in 0..40 {
        let mut c = Container::new("row");
        c.put_int("n", n).unwrap();
        engine.put("bulk", c, WriteMode::Immediate).unwrap();
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    while engine.container_count() > 8 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(50));
    }
    assert!(engine.container_count() <= 8);
    assert!(engine.cache_status().evictions >= 32);
}
