//! Integer range index
//!
//! Uses BTreeMap<i64, Vec<u32>> for ordered range scans.
//! Uid lists are always sorted ascending.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use super::errors::{SearchIndexError, SearchIndexResult};

/// Range query modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeQuery {
    /// Values strictly below the bound
    LessThan(i64),
    /// Values strictly above the bound
    GreaterThan(i64),
    /// Values within [min, max], both inclusive
    Between(i64, i64),
}

/// Integer-keyed index backing Range definitions
#[derive(Debug, Default)]
pub struct RangeIndex {
    tree: BTreeMap<i64, Vec<u32>>,
}

impl RangeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a uid for a value, keeping uid lists sorted
    pub fn insert(&mut self, value: i64, uid: u32) {
        let uids = self.tree.entry(value).or_default();
        if let Err(pos) = uids.binary_search(&uid) {
            uids.insert(pos, uid);
        }
    }

    /// Remove a uid for a value; the value goes once it has no uids
    pub fn remove(&mut self, value: i64, uid: u32) {
        if let Some(uids) = self.tree.get_mut(&value) {
            if let Ok(pos) = uids.binary_search(&uid) {
                uids.remove(pos);
            }
            if uids.is_empty() {
                self.tree.remove(&value);
            }
        }
    }

    /// Uids matching the query, sorted ascending and deduplicated
    pub fn lookup(&self, query: RangeQuery) -> SearchIndexResult<Vec<u32>> {
        let bounds: (Bound<i64>, Bound<i64>) = match query {
            RangeQuery::LessThan(max) => (Bound::Unbounded, Bound::Excluded(max)),
            RangeQuery::GreaterThan(min) => (Bound::Excluded(min), Bound::Unbounded),
            RangeQuery::Between(min, max) => {
                if min > max {
                    return Err(SearchIndexError::InvalidRange { min, max });
                }
                (Bound::Included(min), Bound::Included(max))
            }
        };

        let mut result: Vec<u32> = self
            .tree
            .range(bounds)
            .flat_map(|(_, uids)| uids.iter().copied())
            .collect();
        result.sort_unstable();
        result.dedup();
        Ok(result)
    }

    /// Number of distinct values
    pub fn key_count(&self) -> usize {
        self.tree.len()
    }

    pub fn all_uids(&self) -> Vec<u32> {
        let set: BTreeSet<u32> = self.tree.values().flatten().copied().collect();
        set.into_iter().collect()
    }

    pub fn value_summary(&self) -> Vec<(String, usize)> {
        self.tree
            .iter()
            .map(|(value, uids)| (value.to_string(), uids.len()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> RangeIndex {
        let mut index = RangeIndex::new();
        for (value, uid) in [(9, 1), (10, 2), (15, 3), (20, 4), (21, 5)] {
            index.insert(value, uid);
        }
        index
    }

    #[test]
    fn test_between_inclusive_boundaries() {
        let index = populated();
        assert_eq!(
            index.lookup(RangeQuery::Between(10, 20)).unwrap(),
            vec![2, 3, 4]
        );
    }

    #[test]
    fn test_strict_less_and_greater() {
        let index = populated();
        assert_eq!(index.lookup(RangeQuery::LessThan(10)).unwrap(), vec![1]);
        assert_eq!(index.lookup(RangeQuery::GreaterThan(20)).unwrap(), vec![5]);
    }

    #[test]
    fn test_between_rejects_inverted() {
        let index = populated();
        assert_eq!(
            index.lookup(RangeQuery::Between(5, 1)),
            Err(SearchIndexError::InvalidRange { min: 5, max: 1 })
        );
    }

    #[test]
    fn test_results_sorted_across_values() {
        let mut index = RangeIndex::new();
        index.insert(1, 50);
        index.insert(2, 10);
        index.insert(3, 50);
        assert_eq!(
            index.lookup(RangeQuery::Between(1, 3)).unwrap(),
            vec![10, 50]
        );
    }

    #[test]
    fn test_remove_and_stats() {
        let mut index = populated();
        index.remove(9, 1);
        assert_eq!(index.key_count(), 4);
        assert_eq!(index.all_uids(), vec![2, 3, 4, 5]);
        assert_eq!(index.value_summary()[0], ("10".to_string(), 1));
    }
}
