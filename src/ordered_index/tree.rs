//! BTreeMap-backed ordered index
//!
//! Keys are owned byte strings. Values are disposed through a single
//! optional closure when removed, cleared, or dropped with the index.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;

use super::errors::{OrderedIndexError, OrderedIndexResult};

/// Value disposer. Captures whatever context it needs.
pub type Disposer<V> = Box<dyn Fn(V) + Send + Sync>;

/// Sorted map from byte-string keys to values.
pub struct OrderedIndex<V> {
    tree: BTreeMap<Box<[u8]>, V>,
    disposer: Option<Disposer<V>>,
}

impl<V> Default for OrderedIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for OrderedIndex<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedIndex")
            .field("entries", &self.tree.len())
            .field("has_disposer", &self.disposer.is_some())
            .finish()
    }
}

impl<V> OrderedIndex<V> {
    /// Creates an empty index without a disposer
    pub fn new() -> Self {
        Self {
            tree: BTreeMap::new(),
            disposer: None,
        }
    }

    /// Creates an empty index that routes released values to `disposer`
    pub fn with_disposer<F>(disposer: F) -> Self
    where
        F: Fn(V) + Send + Sync + 'static,
    {
        Self {
            tree: BTreeMap::new(),
            disposer: Some(Box::new(disposer)),
        }
    }

    /// Replaces the active disposer
    pub fn set_disposer<F>(&mut self, disposer: F)
    where
        F: Fn(V) + Send + Sync + 'static,
    {
        self.disposer = Some(Box::new(disposer));
    }

    /// Insert a value under a new key.
    ///
    /// Fails with `KeyExists` if the key is present; the stored value is
    /// left untouched.
    pub fn put(&mut self, key: &[u8], value: V) -> OrderedIndexResult<()> {
        if key.is_empty() {
            return Err(OrderedIndexError::EmptyKey);
        }
        if self.tree.contains_key(key) {
            return Err(OrderedIndexError::exists(key));
        }
        self.tree.insert(key.into(), value);
        Ok(())
    }

    pub fn get(&self, key: &[u8]) -> Option<&V> {
        self.tree.get(key)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut V> {
        self.tree.get_mut(key)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.tree.contains_key(key)
    }

    /// Remove a key and hand its value to the disposer
    pub fn remove(&mut self, key: &[u8]) -> OrderedIndexResult<()> {
        match self.tree.remove(key) {
            Some(value) => {
                self.dispose(value);
                Ok(())
            }
            None => Err(OrderedIndexError::not_found(key)),
        }
    }

    /// Remove a key and return its value without disposing it
    pub fn take(&mut self, key: &[u8]) -> Option<V> {
        self.tree.remove(key)
    }

    /// First entry strictly after `after`. An empty key starts the sequence.
    pub fn next(&self, after: &[u8]) -> Option<(&[u8], &V)> {
        let lower = if after.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(after)
        };
        self.tree
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.as_ref(), v))
    }

    /// Last entry strictly before `before`. An empty key starts from the end.
    pub fn previous(&self, before: &[u8]) -> Option<(&[u8], &V)> {
        let upper = if before.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(before)
        };
        self.tree
            .range::<[u8], _>((Bound::Unbounded, upper))
            .next_back()
            .map(|(k, v)| (k.as_ref(), v))
    }

    /// Entries in ascending key order
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &V)> {
        self.tree.iter().map(|(k, v)| (k.as_ref(), v))
    }

    /// Mutable values in ascending key order
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.tree.values_mut()
    }

    /// Number of stored entries
    pub fn entry_count(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Remove every entry, disposing each value
    pub fn clear(&mut self) {
        let tree = std::mem::take(&mut self.tree);
        for (_, value) in tree {
            self.dispose(value);
        }
    }

    fn dispose(&self, value: V) {
        if let Some(ref disposer) = self.disposer {
            disposer(value);
        }
    }
}

impl<V> Drop for OrderedIndex<V> {
    fn drop(&mut self) {
        if self.disposer.is_some() {
            self.clear();
        }
    }
}
