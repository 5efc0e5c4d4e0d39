//! Token → sorted uid list map

use std::collections::BTreeSet;

use crate::ordered_index::OrderedIndex;

/// String-keyed index backing Exact, Wildcard and UserKey definitions.
///
/// Uid lists are kept sorted ascending; a key with no uids is dropped.
#[derive(Debug, Default)]
pub struct StringIndex {
    map: OrderedIndex<Vec<u32>>,
}

impl StringIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `uid` under `token`. Adding an existing pair is a no-op.
    pub fn insert(&mut self, token: &str, uid: u32) {
        if token.is_empty() {
            return;
        }
        match self.map.get_mut(token.as_bytes()) {
            Some(uids) => {
                if let Err(pos) = uids.binary_search(&uid) {
                    uids.insert(pos, uid);
                }
            }
            None => {
                // Key absence checked above; put cannot collide
                let _ = self.map.put(token.as_bytes(), vec![uid]);
            }
        }
    }

    /// Remove `uid` from `token`, dropping the key once empty
    pub fn remove(&mut self, token: &str, uid: u32) {
        let now_empty = match self.map.get_mut(token.as_bytes()) {
            Some(uids) => {
                if let Ok(pos) = uids.binary_search(&uid) {
                    uids.remove(pos);
                }
                uids.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.map.take(token.as_bytes());
        }
    }

    /// Uids stored under `token`, sorted ascending
    pub fn lookup(&self, token: &str) -> &[u32] {
        self.map
            .get(token.as_bytes())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct tokens
    pub fn key_count(&self) -> usize {
        self.map.entry_count()
    }

    /// Every uid under any token, sorted and deduplicated
    pub fn all_uids(&self) -> Vec<u32> {
        let set: BTreeSet<u32> = self
            .map
            .iter()
            .flat_map(|(_, uids)| uids.iter().copied())
            .collect();
        set.into_iter().collect()
    }

    /// Each token with the number of uids it holds
    pub fn value_summary(&self) -> Vec<(String, usize)> {
        self.map
            .iter()
            .map(|(k, uids)| (String::from_utf8_lossy(k).into_owned(), uids.len()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_sorted_unique() {
        let mut index = StringIndex::new();
        index.insert("pain", 30);
        index.insert("pain", 10);
        index.insert("pain", 20);
        index.insert("pain", 10);
        assert_eq!(index.lookup("pain"), &[10, 20, 30]);
        assert_eq!(index.lookup("none"), &[] as &[u32]);
    }

    #[test]
    fn test_remove_drops_empty_keys() {
        let mut index = StringIndex::new();
        index.insert("a", 1);
        index.insert("a", 2);
        index.remove("a", 1);
        assert_eq!(index.lookup("a"), &[2]);
        index.remove("a", 2);
        assert_eq!(index.key_count(), 0);
        index.remove("a", 2);
    }

    #[test]
    fn test_statistics() {
        let mut index = StringIndex::new();
        index.insert("alpha", 1);
        index.insert("alpha", 2);
        index.insert("beta", 2);
        index.insert("gamma", 3);

        assert_eq!(index.key_count(), 3);
        assert_eq!(index.all_uids(), vec![1, 2, 3]);
        assert_eq!(
            index.value_summary(),
            vec![
                ("alpha".to_string(), 2),
                ("beta".to_string(), 1),
                ("gamma".to_string(), 1)
            ]
        );
    }
}
