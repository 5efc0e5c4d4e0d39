//! Index registry errors

use thiserror::Error;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Index registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Index already exists: {0}")]
    AlreadyExists(String),

    #[error("Index not found: {0}")]
    NotFound(String),

    #[error("Invalid index key: {0:?}")]
    InvalidKey(String),

    #[error("Invalid index settings: {0}")]
    InvalidSettings(String),
}
