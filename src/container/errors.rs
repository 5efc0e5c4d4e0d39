//! Container error types
//!
//! Error codes:
//! - SEARCHD_CONTAINER_INVALID_ARGUMENTS
//! - SEARCHD_CONTAINER_UID_IMMUTABLE
//! - SEARCHD_CONTAINER_MISSING_ATTRIBUTE
//! - SEARCHD_CONTAINER_CORRUPT
//! - SEARCHD_CONTAINER_TRUNCATED
//! - SEARCHD_CONTAINER_INVALID_JSON

use std::fmt;

/// Container-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerErrorCode {
    /// Empty attribute name or similar caller mistake
    InvalidArguments,
    /// Attempt to change a non-zero uid
    UidImmutable,
    /// Update policy referenced an attribute the base lacks
    MissingAttribute,
    /// Checksum mismatch or undecodable field
    Corrupt,
    /// Buffer ended before the encoding did
    Truncated,
    /// JSON input was not an object
    InvalidJson,
}

impl ContainerErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            ContainerErrorCode::InvalidArguments => "SEARCHD_CONTAINER_INVALID_ARGUMENTS",
            ContainerErrorCode::UidImmutable => "SEARCHD_CONTAINER_UID_IMMUTABLE",
            ContainerErrorCode::MissingAttribute => "SEARCHD_CONTAINER_MISSING_ATTRIBUTE",
            ContainerErrorCode::Corrupt => "SEARCHD_CONTAINER_CORRUPT",
            ContainerErrorCode::Truncated => "SEARCHD_CONTAINER_TRUNCATED",
            ContainerErrorCode::InvalidJson => "SEARCHD_CONTAINER_INVALID_JSON",
        }
    }

    /// Returns true for codes describing damaged encoded data
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            ContainerErrorCode::Corrupt | ContainerErrorCode::Truncated
        )
    }
}

impl fmt::Display for ContainerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Container error with context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerError {
    code: ContainerErrorCode,
    message: String,
    details: Option<String>,
}

impl ContainerError {
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self {
            code: ContainerErrorCode::InvalidArguments,
            message: message.into(),
            details: None,
        }
    }

    pub fn uid_immutable(current: u32, requested: u32) -> Self {
        Self {
            code: ContainerErrorCode::UidImmutable,
            message: "container uid is already assigned".to_string(),
            details: Some(format!("current: {}, requested: {}", current, requested)),
        }
    }

    /// Update policy found an overlay attribute the base does not carry
    pub fn missing_attribute(name: &str) -> Self {
        Self {
            code: ContainerErrorCode::MissingAttribute,
            message: "attribute to update does not exist".to_string(),
            details: Some(format!("attribute: {}", name)),
        }
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self {
            code: ContainerErrorCode::Corrupt,
            message: message.into(),
            details: None,
        }
    }

    /// Corruption detected at a byte offset within the encoding
    pub fn corrupt_at_offset(offset: usize, reason: impl Into<String>) -> Self {
        Self {
            code: ContainerErrorCode::Corrupt,
            message: reason.into(),
            details: Some(format!("byte_offset: {}", offset)),
        }
    }

    pub fn truncated(needed: usize, available: usize) -> Self {
        Self {
            code: ContainerErrorCode::Truncated,
            message: "encoded container ended early".to_string(),
            details: Some(format!("needed: {}, available: {}", needed, available)),
        }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        Self {
            code: ContainerErrorCode::InvalidJson,
            message: message.into(),
            details: None,
        }
    }

    pub fn code(&self) -> ContainerErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ERROR] {}: {}", self.code.code(), self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for ContainerError {}

/// Result type for container operations
pub type ContainerResult<T> = Result<T, ContainerError>;
