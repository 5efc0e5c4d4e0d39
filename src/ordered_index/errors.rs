//! Ordered index errors

use thiserror::Error;

/// Result type for ordered index operations
pub type OrderedIndexResult<T> = Result<T, OrderedIndexError>;

/// Ordered index errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderedIndexError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Key already exists: {0}")]
    KeyExists(String),

    #[error("Empty key")]
    EmptyKey,
}

impl OrderedIndexError {
    /// Build a not-found error for a raw key
    pub fn not_found(key: &[u8]) -> Self {
        OrderedIndexError::KeyNotFound(String::from_utf8_lossy(key).into_owned())
    }

    /// Build an already-exists error for a raw key
    pub fn exists(key: &[u8]) -> Self {
        OrderedIndexError::KeyExists(String::from_utf8_lossy(key).into_owned())
    }
}
