//! Per-domain index errors

use thiserror::Error;

/// Result type for per-domain index operations
pub type SearchIndexResult<T> = Result<T, SearchIndexError>;

/// Per-domain index errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchIndexError {
    #[error("Index not found in domain: {0}")]
    IndexNotFound(String),

    #[error("Index already exists in domain: {0}")]
    IndexExists(String),

    #[error("Index {key} is not a {expected} index")]
    WrongType { key: String, expected: &'static str },

    #[error("Invalid range: min {min} exceeds max {max}")]
    InvalidRange { min: i64, max: i64 },

    #[error("Index {key} is a {from} index and cannot be renamed as {to}")]
    TypeChanged {
        key: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("String is shorter than the minimum indexed length: {0:?}")]
    TooShort(String),
}
