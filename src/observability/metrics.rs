//! Metrics registry for searchd
//!
//! - Counters only
//! - Monotonic increase
//! - Relaxed atomics; values are exact once the engine is quiescent

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters for one engine instance
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    puts: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    frees: AtomicU64,
    searches: AtomicU64,
    evictions: AtomicU64,
    queue_batches: AtomicU64,
    queue_failures: AtomicU64,
    index_failures: AtomicU64,
    state_writes: AtomicU64,
    data_writes: AtomicU64,
    persistence_failures: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment applied puts
    pub fn increment_puts(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment applied updates
    pub fn increment_updates(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment deletes
    pub fn increment_deletes(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment released containers
    pub fn increment_frees(&self) {
        self.frees.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment executed searches
    pub fn increment_searches(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    /// Add cache evictions
    pub fn add_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Increment worker batches
    pub fn increment_queue_batches(&self) {
        self.queue_batches.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment discarded queue entries
    pub fn increment_queue_failures(&self) {
        self.queue_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment failed attribute index updates
    pub fn increment_index_failures(&self) {
        self.index_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment state snapshots written
    pub fn increment_state_writes(&self) {
        self.state_writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment container snapshots written
    pub fn increment_data_writes(&self) {
        self.data_writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment failed snapshot writes or reads
    pub fn increment_persistence_failures(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            puts: self.puts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
            searches: self.searches.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            queue_batches: self.queue_batches.load(Ordering::Relaxed),
            queue_failures: self.queue_failures.load(Ordering::Relaxed),
            index_failures: self.index_failures.load(Ordering::Relaxed),
            state_writes: self.state_writes.load(Ordering::Relaxed),
            data_writes: self.data_writes.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub puts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub frees: u64,
    pub searches: u64,
    pub evictions: u64,
    pub queue_batches: u64,
    pub queue_failures: u64,
    pub index_failures: u64,
    pub state_writes: u64,
    pub data_writes: u64,
    pub persistence_failures: u64,
}

impl MetricsSnapshot {
    /// Render the snapshot as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
