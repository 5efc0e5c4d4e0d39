//! Index definitions

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Storage kind behind an index definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexType {
    /// Whole normalized value plus delimited tokens
    Exact,
    /// Stemmed tokens with their prefixes and suffixes
    Wildcard,
    /// Integer values supporting range queries
    Range,
    /// Exact-style index holding at most one container per value
    UserKey,
}

impl IndexType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::Exact => "exact",
            IndexType::Wildcard => "wildcard",
            IndexType::Range => "range",
            IndexType::UserKey => "userKey",
        }
    }

    /// Parse the textual form written by `as_str`
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "exact" => Some(IndexType::Exact),
            "wildcard" => Some(IndexType::Wildcard),
            "range" => Some(IndexType::Range),
            "userKey" => Some(IndexType::UserKey),
            _ => None,
        }
    }

    /// True for types backed by a string map
    pub fn is_string_map(&self) -> bool {
        !matches!(self, IndexType::Range)
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Words never indexed by a wildcard definition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludedWords {
    /// File the words were loaded from
    pub path: PathBuf,
    /// Raw and stemmed forms
    pub words: BTreeSet<String>,
}

impl ExcludedWords {
    pub fn new(path: impl Into<PathBuf>, words: BTreeSet<String>) -> Self {
        Self {
            path: path.into(),
            words,
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Per-definition overrides of the engine-wide text settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSettings {
    pub min_string_length: Option<usize>,
    pub max_string_length: Option<usize>,
    pub delimiters: Option<String>,
    pub excluded_words: Option<ExcludedWords>,
    pub full_string_indexing: bool,
    pub tokenized_indexing: bool,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            min_string_length: None,
            max_string_length: None,
            delimiters: None,
            excluded_words: None,
            full_string_indexing: true,
            tokenized_indexing: true,
        }
    }
}

/// Engine-wide text settings the overrides fall back to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDefaults {
    pub min_string_length: usize,
    pub max_string_length: usize,
    pub delimiters: String,
    /// Engine-wide exclusions for wildcard definitions without their own
    pub excluded_words: Option<ExcludedWords>,
}

/// Resolved text settings for one definition
#[derive(Debug, Clone, Copy)]
pub struct EffectiveText<'a> {
    pub min_length: usize,
    pub max_length: usize,
    pub delimiters: &'a str,
    pub excluded: Option<&'a ExcludedWords>,
    pub full_string: bool,
    pub tokenized: bool,
}

impl EffectiveText<'_> {
    pub fn is_excluded(&self, word: &str) -> bool {
        self.excluded.map_or(false, |e| e.contains(word))
    }
}

/// A named index definition shared by every domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    pub uid: u32,
    pub index_type: IndexType,
    /// Normalized attribute key; unique across the registry
    pub key: String,
    pub name: String,
    pub settings: IndexSettings,
}

impl IndexDefinition {
    /// Resolve overrides against the engine defaults
    pub fn effective<'a>(&'a self, defaults: &'a TextDefaults) -> EffectiveText<'a> {
        EffectiveText {
            min_length: self
                .settings
                .min_string_length
                .unwrap_or(defaults.min_string_length),
            max_length: self
                .settings
                .max_string_length
                .unwrap_or(defaults.max_string_length),
            delimiters: self
                .settings
                .delimiters
                .as_deref()
                .unwrap_or(&defaults.delimiters),
            excluded: self
                .settings
                .excluded_words
                .as_ref()
                .or(defaults.excluded_words.as_ref()),
            full_string: self.settings.full_string_indexing,
            tokenized: self.settings.tokenized_indexing,
        }
    }
}
