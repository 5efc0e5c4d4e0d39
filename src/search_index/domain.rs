//! Per-domain index storage
//!
//! A `SearchIndex` holds one concrete structure per registry definition.
//! Structural changes (new/remove/rename/reset) happen under the engine
//! write lock; attribute maintenance and lookups go through the storage
//! lock held here.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::container::{AttributeValue, Container};
use crate::registry::{IndexDefinition, IndexRegistry, IndexType, TextDefaults};
use crate::text::Stemmer;

use super::errors::{SearchIndexError, SearchIndexResult};
use super::pipeline::{full_string_key, range_value, string_keys, tokens};
use super::range::{RangeIndex, RangeQuery};
use super::string_index::StringIndex;

/// Concrete storage behind one definition
#[derive(Debug)]
pub enum IndexStorage {
    Strings(StringIndex),
    Range(RangeIndex),
}

impl IndexStorage {
    fn for_type(index_type: IndexType) -> Self {
        match index_type {
            IndexType::Range => IndexStorage::Range(RangeIndex::new()),
            _ => IndexStorage::Strings(StringIndex::new()),
        }
    }

    fn key_count(&self) -> usize {
        match self {
            IndexStorage::Strings(s) => s.key_count(),
            IndexStorage::Range(r) => r.key_count(),
        }
    }

    fn all_uids(&self) -> Vec<u32> {
        match self {
            IndexStorage::Strings(s) => s.all_uids(),
            IndexStorage::Range(r) => r.all_uids(),
        }
    }

    fn value_summary(&self) -> Vec<(String, usize)> {
        match self {
            IndexStorage::Strings(s) => s.value_summary(),
            IndexStorage::Range(r) => r.value_summary(),
        }
    }
}

/// Storage plus the definition type it was allocated for
#[derive(Debug)]
struct IndexEntry {
    index_type: IndexType,
    storage: IndexStorage,
}

impl IndexEntry {
    fn new(index_type: IndexType) -> Self {
        Self {
            index_type,
            storage: IndexStorage::for_type(index_type),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Maintenance {
    Insert,
    Remove,
}

/// Index storage for one domain
#[derive(Debug)]
pub struct SearchIndex {
    key: String,
    name: String,
    storage: RwLock<BTreeMap<String, IndexEntry>>,
}

impl SearchIndex {
    /// Create a domain with storage for every given definition
    pub fn new<'a>(
        key: &str,
        name: &str,
        definitions: impl IntoIterator<Item = &'a IndexDefinition>,
    ) -> Self {
        let storage = definitions
            .into_iter()
            .map(|d| (d.key.clone(), IndexEntry::new(d.index_type)))
            .collect();
        Self {
            key: key.to_string(),
            name: name.to_string(),
            storage: RwLock::new(storage),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, key: &str, name: &str) {
        self.key = key.to_string();
        self.name = name.to_string();
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Allocate storage for a new definition
    pub fn new_index(&self, definition: &IndexDefinition) -> SearchIndexResult<()> {
        let mut storage = self.storage.write();
        if storage.contains_key(&definition.key) {
            return Err(SearchIndexError::IndexExists(definition.key.clone()));
        }
        storage.insert(definition.key.clone(), IndexEntry::new(definition.index_type));
        Ok(())
    }

    pub fn remove_index(&self, key: &str) -> SearchIndexResult<()> {
        self.storage
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| SearchIndexError::IndexNotFound(key.to_string()))
    }

    /// Replace storage under `old_key` with empty storage for `definition`
    pub fn reset_index(&self, old_key: &str, definition: &IndexDefinition) -> SearchIndexResult<()> {
        let mut storage = self.storage.write();
        if storage.remove(old_key).is_none() {
            return Err(SearchIndexError::IndexNotFound(old_key.to_string()));
        }
        storage.insert(definition.key.clone(), IndexEntry::new(definition.index_type));
        Ok(())
    }

    /// Move the storage under `old_key` to `definition.key`, keeping its
    /// entries. The definition type must match the stored one.
    pub fn rename_index(&self, old_key: &str, definition: &IndexDefinition) -> SearchIndexResult<()> {
        let mut storage = self.storage.write();
        let index_type = storage
            .get(old_key)
            .map(|entry| entry.index_type)
            .ok_or_else(|| SearchIndexError::IndexNotFound(old_key.to_string()))?;
        if index_type != definition.index_type {
            return Err(SearchIndexError::TypeChanged {
                key: old_key.to_string(),
                from: index_type.as_str(),
                to: definition.index_type.as_str(),
            });
        }
        if definition.key != old_key && storage.contains_key(&definition.key) {
            return Err(SearchIndexError::IndexExists(definition.key.clone()));
        }
        if let Some(entry) = storage.remove(old_key) {
            storage.insert(definition.key.clone(), entry);
        }
        Ok(())
    }

    pub fn has_index(&self, key: &str) -> bool {
        self.storage.read().contains_key(key)
    }

    /// Number of definitions with storage here
    pub fn index_len(&self) -> usize {
        self.storage.read().len()
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Index one attribute value under `definition`
    pub fn index_value(
        &self,
        definition: &IndexDefinition,
        defaults: &TextDefaults,
        stemmer: &dyn Stemmer,
        uid: u32,
        value: &AttributeValue,
    ) -> SearchIndexResult<()> {
        self.maintain(definition, defaults, stemmer, uid, value, Maintenance::Insert)
    }

    /// Remove one attribute value from `definition`; mirrors `index_value`
    pub fn unindex_value(
        &self,
        definition: &IndexDefinition,
        defaults: &TextDefaults,
        stemmer: &dyn Stemmer,
        uid: u32,
        value: &AttributeValue,
    ) -> SearchIndexResult<()> {
        self.maintain(definition, defaults, stemmer, uid, value, Maintenance::Remove)
    }

    fn maintain(
        &self,
        definition: &IndexDefinition,
        defaults: &TextDefaults,
        stemmer: &dyn Stemmer,
        uid: u32,
        value: &AttributeValue,
        op: Maintenance,
    ) -> SearchIndexResult<()> {
        let text = definition.effective(defaults);

        // Resolve keys before taking the storage lock
        let string_keys = match definition.index_type {
            IndexType::Range => Vec::new(),
            index_type => {
                let raw = value.as_string();
                if op == Maintenance::Insert
                    && index_type == IndexType::UserKey
                    && matches!(value, AttributeValue::String(_))
                    && crate::text::normalize(&raw).chars().count() < text.min_length
                {
                    return Err(SearchIndexError::TooShort(raw));
                }
                string_keys(&raw, index_type, &text, stemmer)
            }
        };

        let mut storage = self.storage.write();
        let slot = storage
            .get_mut(&definition.key)
            .ok_or_else(|| SearchIndexError::IndexNotFound(definition.key.clone()))?;

        match &mut slot.storage {
            IndexStorage::Strings(index) => {
                for key in &string_keys {
                    match op {
                        Maintenance::Insert => index.insert(key, uid),
                        Maintenance::Remove => index.remove(key, uid),
                    }
                }
            }
            IndexStorage::Range(index) => {
                if let Some(number) = range_value(&definition.key, value) {
                    match op {
                        Maintenance::Insert => index.insert(number, uid),
                        Maintenance::Remove => index.remove(number, uid),
                    }
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Uids stored under an already prepared key
    pub fn lookup_key(&self, index_key: &str, key: &str) -> SearchIndexResult<Vec<u32>> {
        match self.storage.read().get(index_key).map(|entry| &entry.storage) {
            Some(IndexStorage::Strings(index)) => Ok(index.lookup(key).to_vec()),
            Some(IndexStorage::Range(_)) => Err(SearchIndexError::WrongType {
                key: index_key.to_string(),
                expected: "string",
            }),
            None => Err(SearchIndexError::IndexNotFound(index_key.to_string())),
        }
    }

    /// Uids whose whole value matches `value` under `definition`
    pub fn search_exact(
        &self,
        definition: &IndexDefinition,
        defaults: &TextDefaults,
        value: &str,
    ) -> SearchIndexResult<Vec<u32>> {
        let text = definition.effective(defaults);
        match full_string_key(value, definition.index_type, &text) {
            Some(key) => self.lookup_key(&definition.key, &key),
            None => Ok(Vec::new()),
        }
    }

    /// One uid list per query token under a wildcard `definition`
    pub fn search_tokens(
        &self,
        definition: &IndexDefinition,
        defaults: &TextDefaults,
        stemmer: &dyn Stemmer,
        value: &str,
    ) -> SearchIndexResult<Vec<Vec<u32>>> {
        let text = definition.effective(defaults);
        tokens(value, definition.index_type, &text, stemmer)
            .iter()
            .map(|token| self.lookup_key(&definition.key, token))
            .collect()
    }

    pub fn search_range(&self, index_key: &str, query: RangeQuery) -> SearchIndexResult<Vec<u32>> {
        match self.storage.read().get(index_key).map(|entry| &entry.storage) {
            Some(IndexStorage::Range(index)) => index.lookup(query),
            Some(IndexStorage::Strings(_)) => Err(SearchIndexError::WrongType {
                key: index_key.to_string(),
                expected: "range",
            }),
            None => Err(SearchIndexError::IndexNotFound(index_key.to_string())),
        }
    }

    /// Uids other than `exclude` holding a user-key value.
    ///
    /// Used to reject a container whose user key another container owns.
    pub fn user_key_conflicts(
        &self,
        definition: &IndexDefinition,
        defaults: &TextDefaults,
        value: &str,
        exclude: u32,
    ) -> SearchIndexResult<Vec<u32>> {
        let mut holders = self.search_exact(definition, defaults, value)?;
        holders.retain(|uid| *uid != exclude);
        Ok(holders)
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    /// Distinct keys stored for a definition
    pub fn index_count(&self, index_key: &str) -> SearchIndexResult<usize> {
        self.with_storage(index_key, IndexStorage::key_count)
    }

    /// Distinct uids stored for a definition
    pub fn unique_value_count(&self, index_key: &str) -> SearchIndexResult<usize> {
        self.with_storage(index_key, |s| s.all_uids().len())
    }

    pub fn value_summary(&self, index_key: &str) -> SearchIndexResult<Vec<(String, usize)>> {
        self.with_storage(index_key, IndexStorage::value_summary)
    }

    /// Every uid stored for a definition, sorted
    pub fn all_value_uids(&self, index_key: &str) -> SearchIndexResult<Vec<u32>> {
        self.with_storage(index_key, IndexStorage::all_uids)
    }

    fn with_storage<T>(
        &self,
        index_key: &str,
        f: impl FnOnce(&IndexStorage) -> T,
    ) -> SearchIndexResult<T> {
        self.storage
            .read()
            .get(index_key)
            .map(|entry| f(&entry.storage))
            .ok_or_else(|| SearchIndexError::IndexNotFound(index_key.to_string()))
    }

    /// Clear every structure, keeping the definitions
    pub fn clear(&self) {
        for entry in self.storage.write().values_mut() {
            match &mut entry.storage {
                IndexStorage::Strings(s) => s.clear(),
                IndexStorage::Range(r) => r.clear(),
            }
        }
    }
}

/// Attributes of `container` that some definition indexes, paired with it.
///
/// Attribute names are matched through the same key normalization the
/// registry applies.
pub fn indexed_attributes<'a>(
    container: &'a Container,
    registry: &'a IndexRegistry,
) -> Vec<(&'a IndexDefinition, &'a AttributeValue)> {
    container
        .attributes()
        .iter()
        .filter_map(|attribute| {
            registry
                .get(&attribute.name)
                .map(|definition| (definition, &attribute.value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::IndexSettings;
    use crate::text::EnglishStemmer;

    fn defaults() -> TextDefaults {
        TextDefaults {
            min_string_length: 3,
            max_string_length: 18,
            delimiters: " |,".to_string(),
            excluded_words: None,
        }
    }

    fn def(uid: u32, index_type: IndexType, key: &str) -> IndexDefinition {
        IndexDefinition {
            uid,
            index_type,
            key: key.to_string(),
            name: key.to_string(),
            settings: IndexSettings::default(),
        }
    }

    #[test]
    fn test_exact_index_and_unindex() {
        let title = def(1, IndexType::Exact, "title");
        let domain = SearchIndex::new("default", "Default", [&title]);
        let stemmer = EnglishStemmer::new();
        let value = AttributeValue::from("Hello World");

        domain.index_value(&title, &defaults(), &stemmer, 7, &value).unwrap();
        assert_eq!(domain.search_exact(&title, &defaults(), "hello, WORLD").unwrap(), vec![7]);
        assert_eq!(domain.lookup_key("title", "hello").unwrap(), vec![7]);

        domain.unindex_value(&title, &defaults(), &stemmer, 7, &value).unwrap();
        assert!(domain.search_exact(&title, &defaults(), "hello world").unwrap().is_empty());
        assert_eq!(domain.index_count("title").unwrap(), 0);
    }

    #[test]
    fn test_wildcard_tokens_and_affixes() {
        let body = def(1, IndexType::Wildcard, "body");
        let domain = SearchIndex::new("default", "Default", [&body]);
        let stemmer = EnglishStemmer::new();
        domain
            .index_value(&body, &defaults(), &stemmer, 3, &AttributeValue::from("Running doctors"))
            .unwrap();

        let clauses = domain
            .search_tokens(&body, &defaults(), &stemmer, "doctor")
            .unwrap();
        assert_eq!(clauses, vec![vec![3]]);
        // prefix of the whole normalized value
        assert_eq!(domain.lookup_key("body", "runn").unwrap(), vec![3]);
        // suffix of the whole normalized value
        assert_eq!(domain.lookup_key("body", "ctors").unwrap(), vec![3]);
    }

    #[test]
    fn test_range_index() {
        let zip = def(1, IndexType::Range, "zip");
        let domain = SearchIndex::new("default", "Default", [&zip]);
        let stemmer = EnglishStemmer::new();
        for (uid, value) in [(1, 100i64), (2, 200), (3, 300)] {
            domain
                .index_value(&zip, &defaults(), &stemmer, uid, &AttributeValue::from(value))
                .unwrap();
        }
        assert_eq!(
            domain.search_range("zip", RangeQuery::Between(100, 200)).unwrap(),
            vec![1, 2]
        );
        assert!(matches!(
            domain.lookup_key("zip", "100"),
            Err(SearchIndexError::WrongType { .. })
        ));
        assert_eq!(domain.all_value_uids("zip").unwrap(), vec![1, 2, 3]);

        // Non-numeric text stays out of the range structure
        domain
            .index_value(&zip, &defaults(), &stemmer, 4, &AttributeValue::from("unknown"))
            .unwrap();
        assert_eq!(domain.all_value_uids("zip").unwrap(), vec![1, 2, 3]);
        assert_eq!(
            domain.search_range("zip", RangeQuery::LessThan(1)).unwrap(),
            Vec::<u32>::new()
        );
    }

    #[test]
    fn test_user_key_conflicts_exclude_self() {
        let email = def(1, IndexType::UserKey, "email");
        let domain = SearchIndex::new("default", "Default", [&email]);
        let stemmer = EnglishStemmer::new();
        domain
            .index_value(&email, &defaults(), &stemmer, 5, &AttributeValue::from("a@b.com"))
            .unwrap();

        assert!(domain
            .user_key_conflicts(&email, &defaults(), "a@b.com", 5)
            .unwrap()
            .is_empty());
        assert_eq!(
            domain.user_key_conflicts(&email, &defaults(), "A@B.COM", 6).unwrap(),
            vec![5]
        );
        assert!(matches!(
            domain.index_value(&email, &defaults(), &stemmer, 6, &AttributeValue::from("ab")),
            Err(SearchIndexError::TooShort(_))
        ));
    }

    #[test]
    fn test_structure_changes() {
        let title = def(1, IndexType::Exact, "title");
        let domain = SearchIndex::new("default", "Default", [&title]);
        assert!(domain.new_index(&title).is_err());

        let heading = def(1, IndexType::Range, "heading");
        domain.reset_index("title", &heading).unwrap();
        assert!(domain.has_index("heading"));
        assert!(!domain.has_index("title"));
        assert!(domain.search_range("heading", RangeQuery::LessThan(0)).is_ok());

        domain.remove_index("heading").unwrap();
        assert_eq!(domain.index_len(), 0);
        assert!(domain.remove_index("heading").is_err());
    }

    #[test]
    fn test_rename_moves_entries() {
        let title = def(1, IndexType::Exact, "title");
        let domain = SearchIndex::new("default", "Default", [&title]);
        let stemmer = EnglishStemmer::new();
        domain
            .index_value(&title, &defaults(), &stemmer, 4, &AttributeValue::from("dune"))
            .unwrap();

        let heading = def(1, IndexType::Exact, "heading");
        domain.rename_index("title", &heading).unwrap();
        assert!(!domain.has_index("title"));
        assert_eq!(domain.lookup_key("heading", "dune").unwrap(), vec![4]);
        assert_eq!(domain.index_count("heading").unwrap(), 1);
    }

    #[test]
    fn test_rename_rejects_type_change_and_collisions() {
        let title = def(1, IndexType::Exact, "title");
        let body = def(2, IndexType::Wildcard, "body");
        let domain = SearchIndex::new("default", "Default", [&title, &body]);

        let as_range = def(1, IndexType::Range, "title");
        assert!(matches!(
            domain.rename_index("title", &as_range),
            Err(SearchIndexError::TypeChanged { from: "exact", to: "range", .. })
        ));
        let onto_body = def(1, IndexType::Exact, "body");
        assert_eq!(
            domain.rename_index("title", &onto_body),
            Err(SearchIndexError::IndexExists("body".to_string()))
        );
        assert_eq!(
            domain.rename_index("missing", &title),
            Err(SearchIndexError::IndexNotFound("missing".to_string()))
        );
        assert!(domain.has_index("title"));
        assert!(domain.has_index("body"));
    }

    #[test]
    fn test_indexed_attributes_match_normalized_names() {
        let mut registry = IndexRegistry::new();
        registry.define(IndexType::Exact, "title", "Title").unwrap();
        registry.define(IndexType::Range, "zip", "Zip").unwrap();
        let mut container = Container::new("doc");
        container.put_string("Title", "x").unwrap();
        container.put_int("zip", 1).unwrap();
        container.put_string("other", "y").unwrap();

        let pairs = indexed_attributes(&container, &registry);
        let keys: Vec<&str> = pairs.iter().map(|(d, _)| d.key.as_str()).collect();
        assert_eq!(keys, vec!["title", "zip"]);
    }
}
