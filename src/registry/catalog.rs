//! Engine-wide catalog of index definitions

use crate::ordered_index::OrderedIndex;
use crate::text::build_index_string;

use super::definition::{ExcludedWords, IndexDefinition, IndexSettings, IndexType};
use super::errors::{RegistryError, RegistryResult};

/// Index definitions keyed by normalized attribute key
#[derive(Debug, Default)]
pub struct IndexRegistry {
    definitions: OrderedIndex<IndexDefinition>,
    uid_counter: u32,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a caller-supplied key, rejecting keys that normalize to nothing
    pub fn index_key(key: &str) -> RegistryResult<String> {
        let normalized = build_index_string(key);
        if normalized.is_empty() {
            return Err(RegistryError::InvalidKey(key.to_string()));
        }
        Ok(normalized)
    }

    /// Create a definition. Fails if the normalized key is taken.
    pub fn define(
        &mut self,
        index_type: IndexType,
        key: &str,
        name: &str,
    ) -> RegistryResult<&IndexDefinition> {
        let key = Self::index_key(key)?;
        if self.definitions.contains(key.as_bytes()) {
            return Err(RegistryError::AlreadyExists(key));
        }
        self.uid_counter += 1;
        let definition = IndexDefinition {
            uid: self.uid_counter,
            index_type,
            key: key.clone(),
            name: name.to_string(),
            settings: IndexSettings::default(),
        };
        self.insert(definition)?;
        self.get(&key).ok_or(RegistryError::NotFound(key))
    }

    /// Insert a fully formed definition, keeping its uid
    pub fn restore(&mut self, definition: IndexDefinition) -> RegistryResult<()> {
        self.uid_counter = self.uid_counter.max(definition.uid);
        self.insert(definition)
    }

    fn insert(&mut self, definition: IndexDefinition) -> RegistryResult<()> {
        let key = definition.key.clone();
        self.definitions
            .put(key.as_bytes(), definition)
            .map_err(|_| RegistryError::AlreadyExists(key))
    }

    pub fn get(&self, key: &str) -> Option<&IndexDefinition> {
        self.definitions.get(build_index_string(key).as_bytes())
    }

    fn get_mut(&mut self, key: &str) -> RegistryResult<&mut IndexDefinition> {
        let normalized = build_index_string(key);
        self.definitions
            .get_mut(normalized.as_bytes())
            .ok_or(RegistryError::NotFound(normalized))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Reset a definition: the type, key and name may all change.
    ///
    /// Per-definition settings and the uid carry over. Returns the
    /// definition as it was before the change.
    pub fn rename(
        &mut self,
        key: &str,
        new_type: IndexType,
        new_key: &str,
        new_name: &str,
    ) -> RegistryResult<IndexDefinition> {
        let old_key = build_index_string(key);
        let new_key = Self::index_key(new_key)?;
        if !self.definitions.contains(old_key.as_bytes()) {
            return Err(RegistryError::NotFound(old_key));
        }
        if new_key != old_key && self.definitions.contains(new_key.as_bytes()) {
            return Err(RegistryError::AlreadyExists(new_key));
        }

        let previous = self
            .definitions
            .take(old_key.as_bytes())
            .ok_or_else(|| RegistryError::NotFound(old_key.clone()))?;
        let updated = IndexDefinition {
            uid: previous.uid,
            index_type: new_type,
            key: new_key,
            name: new_name.to_string(),
            settings: previous.settings.clone(),
        };
        self.insert(updated)?;
        Ok(previous)
    }

    /// Remove a definition and return it
    pub fn remove(&mut self, key: &str) -> RegistryResult<IndexDefinition> {
        let normalized = build_index_string(key);
        self.definitions
            .take(normalized.as_bytes())
            .ok_or(RegistryError::NotFound(normalized))
    }

    /// Definitions in key order
    pub fn iter(&self) -> impl Iterator<Item = &IndexDefinition> {
        self.definitions.iter().map(|(_, d)| d)
    }

    /// Owned copies of every definition, in key order
    pub fn definitions(&self) -> Vec<IndexDefinition> {
        self.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    // ------------------------------------------------------------------
    // Per-definition settings
    // ------------------------------------------------------------------

    /// Override the min/max string lengths; `None` falls back to the engine
    pub fn set_string_lengths(
        &mut self,
        key: &str,
        min: Option<usize>,
        max: Option<usize>,
    ) -> RegistryResult<()> {
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(RegistryError::InvalidSettings(format!(
                    "min length {} exceeds max length {}",
                    min, max
                )));
            }
        }
        let definition = self.get_mut(key)?;
        definition.settings.min_string_length = min;
        definition.settings.max_string_length = max;
        Ok(())
    }

    pub fn set_delimiters(&mut self, key: &str, delimiters: Option<String>) -> RegistryResult<()> {
        if delimiters.as_deref() == Some("") {
            return Err(RegistryError::InvalidSettings(
                "empty delimiter set".to_string(),
            ));
        }
        self.get_mut(key)?.settings.delimiters = delimiters;
        Ok(())
    }

    pub fn set_excluded_words(
        &mut self,
        key: &str,
        excluded: Option<ExcludedWords>,
    ) -> RegistryResult<()> {
        self.get_mut(key)?.settings.excluded_words = excluded;
        Ok(())
    }

    /// Toggle full-string and tokenized indexing
    pub fn set_indexing_flags(
        &mut self,
        key: &str,
        full_string: bool,
        tokenized: bool,
    ) -> RegistryResult<()> {
        let definition = self.get_mut(key)?;
        definition.settings.full_string_indexing = full_string;
        definition.settings.tokenized_indexing = tokenized;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_assigns_uids_and_normalizes() {
        let mut registry = IndexRegistry::new();
        let uid = registry.define(IndexType::Exact, " Title ", "Title").unwrap().uid;
        assert_eq!(uid, 1);
        let def = registry.define(IndexType::Range, "zip", "Zip").unwrap();
        assert_eq!(def.uid, 2);

        assert!(registry.contains("TITLE"));
        assert_eq!(registry.get("title").unwrap().name, "Title");
    }

    #[test]
    fn test_define_rejects_duplicates_and_empty() {
        let mut registry = IndexRegistry::new();
        registry.define(IndexType::Exact, "title", "Title").unwrap();
        assert_eq!(
            registry.define(IndexType::Wildcard, "TITLE", "again").unwrap_err(),
            RegistryError::AlreadyExists("title".to_string())
        );
        assert!(matches!(
            registry.define(IndexType::Exact, " \t", "blank"),
            Err(RegistryError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_iteration_in_key_order() {
        let mut registry = IndexRegistry::new();
        for key in ["zeta", "alpha", "mid"] {
            registry.define(IndexType::Exact, key, key).unwrap();
        }
        let keys: Vec<&str> = registry.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_rename_resets_type_and_keeps_settings() {
        let mut registry = IndexRegistry::new();
        registry.define(IndexType::Exact, "title", "Title").unwrap();
        registry.set_delimiters("title", Some("|".to_string())).unwrap();

        let previous = registry
            .rename("title", IndexType::Wildcard, "heading", "Heading")
            .unwrap();
        assert_eq!(previous.key, "title");
        assert!(!registry.contains("title"));

        let renamed = registry.get("heading").unwrap();
        assert_eq!(renamed.index_type, IndexType::Wildcard);
        assert_eq!(renamed.uid, previous.uid);
        assert_eq!(renamed.settings.delimiters.as_deref(), Some("|"));
    }

    #[test]
    fn test_rename_conflicts() {
        let mut registry = IndexRegistry::new();
        registry.define(IndexType::Exact, "a", "A").unwrap();
        registry.define(IndexType::Exact, "b", "B").unwrap();
        assert!(matches!(
            registry.rename("a", IndexType::Exact, "b", "B"),
            Err(RegistryError::AlreadyExists(_))
        ));
        assert!(matches!(
            registry.rename("missing", IndexType::Exact, "c", "C"),
            Err(RegistryError::NotFound(_))
        ));
        // Same key, new type
        registry.rename("a", IndexType::UserKey, "a", "A").unwrap();
        assert_eq!(registry.get("a").unwrap().index_type, IndexType::UserKey);
    }

    #[test]
    fn test_remove() {
        let mut registry = IndexRegistry::new();
        registry.define(IndexType::Exact, "title", "Title").unwrap();
        let removed = registry.remove("title").unwrap();
        assert_eq!(removed.key, "title");
        assert!(registry.is_empty());
        assert!(registry.remove("title").is_err());
    }

    #[test]
    fn test_settings_setters() {
        let mut registry = IndexRegistry::new();
        registry.define(IndexType::Wildcard, "body", "Body").unwrap();

        registry.set_string_lengths("body", Some(2), Some(40)).unwrap();
        registry.set_indexing_flags("body", false, true).unwrap();
        assert!(registry.set_string_lengths("body", Some(9), Some(3)).is_err());
        assert!(registry.set_delimiters("body", Some(String::new())).is_err());
        assert!(registry.set_delimiters("nope", None).is_err());

        let settings = &registry.get("body").unwrap().settings;
        assert_eq!(settings.min_string_length, Some(2));
        assert_eq!(settings.max_string_length, Some(40));
        assert!(!settings.full_string_indexing);
    }

    #[test]
    fn test_restore_advances_counter() {
        let mut registry = IndexRegistry::new();
        registry
            .restore(IndexDefinition {
                uid: 7,
                index_type: IndexType::Range,
                key: "zip".to_string(),
                name: "Zip".to_string(),
                settings: IndexSettings::default(),
            })
            .unwrap();
        let def = registry.define(IndexType::Exact, "title", "Title").unwrap();
        assert_eq!(def.uid, 8);
    }
}
