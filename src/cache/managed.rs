//! Bounded container cache
//!
//! An `OrderedIndex` wrapped with three ceilings: item count, aggregate
//! memory estimate, and idle age. Entries leaving the cache, through
//! `remove`, `clear`, or a sweep, are handed to the disposer after the
//! internal lock is released.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::ordered_index::{Disposer, OrderedIndex, OrderedIndexError, OrderedIndexResult};

/// Maximum timed-out entries evicted by one sweep
const TIMEOUT_EVICTION_BATCH: usize = 1024;

/// Values the evictor must be able to ask about
pub trait CacheValue {
    /// A pinned value is checked out and must not be evicted
    fn is_pinned(&self) -> bool;
}

impl<T: CacheValue + ?Sized> CacheValue for Arc<T> {
    fn is_pinned(&self) -> bool {
        (**self).is_pinned()
    }
}

/// Cache ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries
    pub max_items: usize,
    /// Maximum aggregate memory estimate in bytes
    pub max_memory: usize,
    /// Idle time after which an entry expires
    pub timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_items: 2048,
            max_memory: 2 * 1024 * 1024,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Point-in-time cache status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStatus {
    pub items: usize,
    pub memory: usize,
    pub max_items: usize,
    pub max_memory: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct CacheEntry<V> {
    value: V,
    memory: usize,
    ticks: u64,
    touched: Instant,
}

struct CacheState<V> {
    entries: OrderedIndex<CacheEntry<V>>,
    memory: usize,
    config: CacheConfig,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<V> CacheState<V> {
    fn over_ceiling(&self) -> bool {
        self.entries.entry_count() > self.config.max_items || self.memory > self.config.max_memory
    }

    fn evict(&mut self, key: &[u8], victims: &mut Vec<V>) {
        if let Some(entry) = self.entries.take(key) {
            self.memory = self.memory.saturating_sub(entry.memory);
            self.evictions += 1;
            victims.push(entry.value);
        }
    }
}

/// Bounded, thread-safe cache keyed by byte strings
pub struct ManagedCache<V> {
    state: Mutex<CacheState<V>>,
    disposer: Option<Disposer<V>>,
}

impl<V> fmt::Debug for ManagedCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManagedCache")
            .field("items", &state.entries.entry_count())
            .field("memory", &state.memory)
            .field("config", &state.config)
            .finish()
    }
}

impl<V: Clone + CacheValue> ManagedCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: OrderedIndex::new(),
                memory: 0,
                config,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            disposer: None,
        }
    }

    /// Cache whose released values go to `disposer`
    pub fn with_disposer<F>(config: CacheConfig, disposer: F) -> Self
    where
        F: Fn(V) + Send + Sync + 'static,
    {
        let mut cache = Self::new(config);
        cache.disposer = Some(Box::new(disposer));
        cache
    }

    pub fn config(&self) -> CacheConfig {
        self.state.lock().config
    }

    /// Change the ceilings. Takes effect on the next sweep.
    pub fn set_config(&self, config: CacheConfig) {
        self.state.lock().config = config;
    }

    /// Insert a new entry with its memory estimate. Fails if the key exists.
    pub fn put(&self, key: &[u8], value: V, memory: usize) -> OrderedIndexResult<()> {
        let mut state = self.state.lock();
        let entry = CacheEntry {
            value,
            memory,
            ticks: 0,
            touched: Instant::now(),
        };
        state.entries.put(key, entry)?;
        state.memory += memory;
        Ok(())
    }

    /// Look up an entry, counting it as a use
    pub fn get(&self, key: &[u8]) -> Option<V> {
        let mut state = self.state.lock();
        let found = state.entries.get_mut(key).map(|entry| {
            entry.ticks += 1;
            entry.touched = Instant::now();
            entry.value.clone()
        });
        match found {
            Some(_) => state.hits += 1,
            None => state.misses += 1,
        }
        found
    }

    /// Look up an entry without touching it
    pub fn peek(&self, key: &[u8]) -> Option<V> {
        self.state
            .lock()
            .entries
            .get(key)
            .map(|entry| entry.value.clone())
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.state.lock().entries.contains(key)
    }

    /// Replace an entry's memory estimate after its contents changed
    pub fn update_memory(&self, key: &[u8], memory: usize) -> OrderedIndexResult<()> {
        let mut state = self.state.lock();
        let previous = match state.entries.get_mut(key) {
            Some(entry) => std::mem::replace(&mut entry.memory, memory),
            None => return Err(OrderedIndexError::not_found(key)),
        };
        state.memory = state.memory.saturating_sub(previous) + memory;
        Ok(())
    }

    /// Remove an entry and dispose of it
    pub fn remove(&self, key: &[u8]) -> OrderedIndexResult<()> {
        let value = self
            .take(key)
            .ok_or_else(|| OrderedIndexError::not_found(key))?;
        self.dispose(value);
        Ok(())
    }

    /// Remove an entry and return it without disposing
    pub fn take(&self, key: &[u8]) -> Option<V> {
        let mut state = self.state.lock();
        let entry = state.entries.take(key)?;
        state.memory = state.memory.saturating_sub(entry.memory);
        Some(entry.value)
    }

    /// First entry strictly after `after`; an empty key starts at the beginning
    pub fn next(&self, after: &[u8]) -> Option<(Vec<u8>, V)> {
        self.state
            .lock()
            .entries
            .next(after)
            .map(|(k, entry)| (k.to_vec(), entry.value.clone()))
    }

    /// Last entry strictly before `before`; an empty key starts at the end
    pub fn previous(&self, before: &[u8]) -> Option<(Vec<u8>, V)> {
        self.state
            .lock()
            .entries
            .previous(before)
            .map(|(k, entry)| (k.to_vec(), entry.value.clone()))
    }

    /// Every value, in key order
    pub fn values(&self) -> Vec<V> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|(_, entry)| entry.value.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn status(&self) -> CacheStatus {
        let state = self.state.lock();
        CacheStatus {
            items: state.entries.entry_count(),
            memory: state.memory,
            max_items: state.config.max_items,
            max_memory: state.config.max_memory,
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
        }
    }

    /// Remove and dispose of every entry, pinned or not
    pub fn clear(&self) {
        let victims: Vec<V> = {
            let mut state = self.state.lock();
            let keys: Vec<Vec<u8>> = state.entries.iter().map(|(k, _)| k.to_vec()).collect();
            let mut out = Vec::with_capacity(keys.len());
            for key in keys {
                if let Some(entry) = state.entries.take(&key) {
                    out.push(entry.value);
                }
            }
            state.memory = 0;
            out
        };
        for value in victims {
            self.dispose(value);
        }
    }

    /// Evict entries until the cache is back under its ceilings.
    ///
    /// 1. Entries idle past the timeout, up to a fixed batch.
    /// 2. Under-used entries that are large or old relative to the average.
    /// 3. Least recently touched entries.
    ///
    /// Pinned entries are never evicted. Returns the number evicted.
    pub fn sweep(&self) -> usize {
        let victims = {
            let mut state = self.state.lock();
            let now = Instant::now();
            let mut victims = Vec::new();

            // Pass 1: idle timeout
            let timeout = state.config.timeout;
            let expired: Vec<Vec<u8>> = state
                .entries
                .iter()
                .filter(|(_, e)| !e.value.is_pinned() && now.duration_since(e.touched) >= timeout)
                .take(TIMEOUT_EVICTION_BATCH)
                .map(|(k, _)| k.to_vec())
                .collect();
            for key in expired {
                state.evict(&key, &mut victims);
            }

            // Pass 2: under-used and large or old
            if state.over_ceiling() {
                let candidates: Vec<(&[u8], &CacheEntry<V>)> = state
                    .entries
                    .iter()
                    .filter(|(_, e)| !e.value.is_pinned())
                    .collect();
                let mut selected: Vec<Vec<u8>> = Vec::new();
                if !candidates.is_empty() {
                    let n = candidates.len() as u128;
                    let avg_memory = candidates.iter().map(|(_, e)| e.memory as u128).sum::<u128>() / n;
                    let avg_ticks = candidates.iter().map(|(_, e)| e.ticks as u128).sum::<u128>() / n;
                    let avg_age = candidates
                        .iter()
                        .map(|(_, e)| now.duration_since(e.touched).as_millis())
                        .sum::<u128>()
                        / n;
                    selected = candidates
                        .iter()
                        .filter(|(_, e)| {
                            let under_used = (e.ticks as u128) <= avg_ticks;
                            let large = (e.memory as u128) >= avg_memory;
                            let old = now.duration_since(e.touched).as_millis() >= avg_age;
                            under_used && (large || old)
                        })
                        .map(|(k, _)| k.to_vec())
                        .collect();
                }
                for key in selected {
                    if !state.over_ceiling() {
                        break;
                    }
                    state.evict(&key, &mut victims);
                }
            }

            // Pass 3: least recently touched
            if state.over_ceiling() {
                let mut remaining: Vec<(Instant, Vec<u8>)> = state
                    .entries
                    .iter()
                    .filter(|(_, e)| !e.value.is_pinned())
                    .map(|(k, e)| (e.touched, k.to_vec()))
                    .collect();
                remaining.sort();
                for (_, key) in remaining {
                    if !state.over_ceiling() {
                        break;
                    }
                    state.evict(&key, &mut victims);
                }
            }

            victims
        };

        let evicted = victims.len();
        if evicted > 0 {
            tracing::debug!(target: "searchd", evicted, "cache sweep");
        }
        for value in victims {
            self.dispose(value);
        }
        evicted
    }

    fn dispose(&self, value: V) {
        if let Some(ref disposer) = self.disposer {
            disposer(value);
        }
    }
}
