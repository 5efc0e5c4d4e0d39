//! Engine error types
//!
//! Every failure carries a symbolic code and a small negative value, grouped
//! by subsystem:
//! - core (-100..-130)
//! - common (-200..-208)
//! - index (-300..-310)
//! - domain (-400..-406)

use std::fmt;
use std::io;

use crate::container::ContainerError;
use crate::intersect::IntersectError;
use crate::ordered_index::OrderedIndexError;
use crate::registry::RegistryError;
use crate::search_index::SearchIndexError;

/// Severity levels for engine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Contention; retrying may succeed
    Warning,
    /// Operation failed, engine continues
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Engine error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineErrorCode {
    // core
    InvalidArguments,
    ReadLock,
    ReadUnlock,
    WriteLock,
    WriteUnlock,
    MissingUid,
    InvalidUid,
    InvalidDirectory,
    FailedToInitConfig,
    StateWrite,
    StateRead,
    DataWrite,
    DataRead,
    InvalidGeoCoordDistanceType,
    ContainerDoesNotExist,
    ContainerAlreadyExists,
    ContainerLock,
    HasReservedKey,
    MissingAttribute,
    FailedToPut,
    FailedToLocate,
    FailedToDelete,
    FailedToUpdateIndexes,
    FailedToCombine,
    DuplicateUserKey,

    // common
    BuildIndexString,
    Normalize,
    IndexKey,
    UidKey,
    RelevancyKey,
    RelevancyLengthKey,
    DetermineType,
    Pad,
    Tokenize,

    // index
    IndexAlreadyExists,
    IndexInit,
    IndexLocate,
    IndexCreate,
    IndexReindex,
    IndexRemove,
    IndexRemoveRegistry,
    IndexTypeNotUserKey,
    IndexTypeInvalid,
    IndexReset,
    IndexRename,

    // domain
    DomainAlreadyExists,
    DomainLocate,
    DomainInit,
    DomainCreate,
    DomainCreateIndex,
    DomainRename,
    DomainRemove,
}

impl EngineErrorCode {
    /// Symbolic code
    pub fn code(&self) -> &'static str {
        use EngineErrorCode::*;
        match self {
            InvalidArguments => "SEARCHD_CORE_INVALID_ARGUMENTS",
            ReadLock => "SEARCHD_CORE_READ_LOCK",
            ReadUnlock => "SEARCHD_CORE_READ_UNLOCK",
            WriteLock => "SEARCHD_CORE_WRITE_LOCK",
            WriteUnlock => "SEARCHD_CORE_WRITE_UNLOCK",
            MissingUid => "SEARCHD_CORE_MISSING_UID",
            InvalidUid => "SEARCHD_CORE_INVALID_UID",
            InvalidDirectory => "SEARCHD_CORE_INVALID_DIRECTORY",
            FailedToInitConfig => "SEARCHD_CORE_FAILED_TO_INIT_CONFIG",
            StateWrite => "SEARCHD_CORE_STATE_WRITE",
            StateRead => "SEARCHD_CORE_STATE_READ",
            DataWrite => "SEARCHD_CORE_DATA_WRITE",
            DataRead => "SEARCHD_CORE_DATA_READ",
            InvalidGeoCoordDistanceType => "SEARCHD_CORE_INVALID_GEO_COORD_DISTANCE_TYPE",
            ContainerDoesNotExist => "SEARCHD_CORE_CONTAINER_DOES_NOT_EXIST",
            ContainerAlreadyExists => "SEARCHD_CORE_CONTAINER_ALREADY_EXISTS",
            ContainerLock => "SEARCHD_CORE_CONTAINER_LOCK",
            HasReservedKey => "SEARCHD_CORE_HAS_RESERVED_KEY",
            MissingAttribute => "SEARCHD_CORE_MISSING_ATTRIBUTE",
            FailedToPut => "SEARCHD_CORE_FAILED_TO_PUT",
            FailedToLocate => "SEARCHD_CORE_FAILED_TO_LOCATE",
            FailedToDelete => "SEARCHD_CORE_FAILED_TO_DELETE",
            FailedToUpdateIndexes => "SEARCHD_CORE_FAILED_TO_UPDATE_INDEXES",
            FailedToCombine => "SEARCHD_CORE_FAILED_TO_COMBINE",
            DuplicateUserKey => "SEARCHD_CORE_DUPLICATE_USER_KEY",

            BuildIndexString => "SEARCHD_COMMON_BUILD_INDEX_STRING",
            Normalize => "SEARCHD_COMMON_NORMALIZE",
            IndexKey => "SEARCHD_COMMON_INDEX_KEY",
            UidKey => "SEARCHD_COMMON_UID_KEY",
            RelevancyKey => "SEARCHD_COMMON_RELEVANCY_KEY",
            RelevancyLengthKey => "SEARCHD_COMMON_RELEVANCY_LENGTH_KEY",
            DetermineType => "SEARCHD_COMMON_DETERMINE_TYPE",
            Pad => "SEARCHD_COMMON_PAD",
            Tokenize => "SEARCHD_COMMON_TOKENIZE",

            IndexAlreadyExists => "SEARCHD_INDEX_ALREADY_EXISTS",
            IndexInit => "SEARCHD_INDEX_INIT",
            IndexLocate => "SEARCHD_INDEX_LOCATE",
            IndexCreate => "SEARCHD_INDEX_CREATE",
            IndexReindex => "SEARCHD_INDEX_REINDEX",
            IndexRemove => "SEARCHD_INDEX_REMOVE",
            IndexRemoveRegistry => "SEARCHD_INDEX_REMOVE_REGISTRY",
            IndexTypeNotUserKey => "SEARCHD_INDEX_TYPE_NOT_USER_KEY",
            IndexTypeInvalid => "SEARCHD_INDEX_TYPE_INVALID",
            IndexReset => "SEARCHD_INDEX_RESET",
            IndexRename => "SEARCHD_INDEX_RENAME",

            DomainAlreadyExists => "SEARCHD_DOMAIN_ALREADY_EXISTS",
            DomainLocate => "SEARCHD_DOMAIN_LOCATE",
            DomainInit => "SEARCHD_DOMAIN_INIT",
            DomainCreate => "SEARCHD_DOMAIN_CREATE",
            DomainCreateIndex => "SEARCHD_DOMAIN_CREATE_INDEX",
            DomainRename => "SEARCHD_DOMAIN_RENAME",
            DomainRemove => "SEARCHD_DOMAIN_REMOVE",
        }
    }

    /// Numeric value reported to wire front ends
    pub fn value(&self) -> i32 {
        use EngineErrorCode::*;
        match self {
            InvalidArguments => -100,
            ReadLock => -101,
            ReadUnlock => -102,
            WriteLock => -103,
            WriteUnlock => -104,
            MissingUid => -105,
            InvalidUid => -106,
            InvalidDirectory => -107,
            FailedToInitConfig => -108,
            StateWrite => -109,
            StateRead => -110,
            DataWrite => -111,
            DataRead => -112,
            InvalidGeoCoordDistanceType => -113,
            ContainerDoesNotExist => -120,
            ContainerAlreadyExists => -121,
            ContainerLock => -122,
            HasReservedKey => -123,
            MissingAttribute => -124,
            FailedToPut => -125,
            FailedToLocate => -126,
            FailedToDelete => -127,
            FailedToUpdateIndexes => -128,
            FailedToCombine => -129,
            DuplicateUserKey => -130,

            BuildIndexString => -200,
            Normalize => -201,
            IndexKey => -202,
            UidKey => -203,
            RelevancyKey => -204,
            RelevancyLengthKey => -205,
            DetermineType => -206,
            Pad => -207,
            Tokenize => -208,

            IndexAlreadyExists => -300,
            IndexInit => -301,
            IndexLocate => -302,
            IndexCreate => -303,
            IndexReindex => -304,
            IndexRemove => -305,
            IndexRemoveRegistry => -306,
            IndexTypeNotUserKey => -307,
            IndexTypeInvalid => -308,
            IndexReset => -309,
            IndexRename => -310,

            DomainAlreadyExists => -400,
            DomainLocate => -401,
            DomainInit => -402,
            DomainCreate => -403,
            DomainCreateIndex => -404,
            DomainRename => -405,
            DomainRemove => -406,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            EngineErrorCode::ReadLock
            | EngineErrorCode::WriteLock
            | EngineErrorCode::ContainerLock => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for EngineErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Engine error with context
#[derive(Debug)]
pub struct EngineError {
    code: EngineErrorCode,
    message: String,
    details: Option<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl EngineError {
    pub fn new(code: EngineErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Attach context such as the offending key
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::InvalidArguments, message)
    }

    pub fn read_lock() -> Self {
        Self::new(EngineErrorCode::ReadLock, "timed out acquiring engine read lock")
    }

    pub fn write_lock() -> Self {
        Self::new(EngineErrorCode::WriteLock, "timed out acquiring engine write lock")
    }

    pub fn container_lock(uid: u32) -> Self {
        Self::new(EngineErrorCode::ContainerLock, "timed out acquiring container lock")
            .with_details(format!("uid: {}", uid))
    }

    pub fn container_missing(uid: u32) -> Self {
        Self::new(EngineErrorCode::ContainerDoesNotExist, "container is not cached")
            .with_details(format!("uid: {}", uid))
    }

    pub fn domain_missing(key: &str) -> Self {
        Self::new(EngineErrorCode::DomainLocate, "domain does not exist")
            .with_details(format!("domain: {}", key))
    }

    pub fn index_missing(key: &str) -> Self {
        Self::new(EngineErrorCode::IndexLocate, "index does not exist")
            .with_details(format!("index: {}", key))
    }

    pub fn io(code: EngineErrorCode, message: impl Into<String>, source: io::Error) -> Self {
        Self::new(code, message).with_source(source)
    }

    pub fn code(&self) -> EngineErrorCode {
        self.code
    }

    pub fn value(&self) -> i32 {
        self.code.value()
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<OrderedIndexError> for EngineError {
    fn from(err: OrderedIndexError) -> Self {
        let code = match err {
            OrderedIndexError::KeyExists(_) => EngineErrorCode::ContainerAlreadyExists,
            OrderedIndexError::KeyNotFound(_) => EngineErrorCode::FailedToLocate,
            OrderedIndexError::EmptyKey => EngineErrorCode::UidKey,
        };
        Self::new(code, err.to_string())
    }
}

impl From<RegistryError> for EngineError {
    fn from(err: RegistryError) -> Self {
        let code = match err {
            RegistryError::AlreadyExists(_) => EngineErrorCode::IndexAlreadyExists,
            RegistryError::NotFound(_) => EngineErrorCode::IndexLocate,
            RegistryError::InvalidKey(_) => EngineErrorCode::BuildIndexString,
            RegistryError::InvalidSettings(_) => EngineErrorCode::InvalidArguments,
        };
        Self::new(code, err.to_string())
    }
}

impl From<SearchIndexError> for EngineError {
    fn from(err: SearchIndexError) -> Self {
        let code = match err {
            SearchIndexError::IndexNotFound(_) => EngineErrorCode::IndexLocate,
            SearchIndexError::IndexExists(_) => EngineErrorCode::DomainCreateIndex,
            SearchIndexError::WrongType { .. } => EngineErrorCode::IndexTypeInvalid,
            SearchIndexError::InvalidRange { .. } => EngineErrorCode::InvalidArguments,
            SearchIndexError::TooShort(_) => EngineErrorCode::FailedToUpdateIndexes,
            SearchIndexError::TypeChanged { .. } => EngineErrorCode::IndexRename,
        };
        Self::new(code, err.to_string())
    }
}

impl From<ContainerError> for EngineError {
    fn from(err: ContainerError) -> Self {
        let code = if err.code().is_corruption() {
            EngineErrorCode::DataRead
        } else {
            EngineErrorCode::InvalidArguments
        };
        Self::new(code, err.to_string())
    }
}

impl From<IntersectError> for EngineError {
    fn from(err: IntersectError) -> Self {
        Self::new(EngineErrorCode::InvalidArguments, err.to_string())
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_values_by_group() {
        assert_eq!(EngineErrorCode::InvalidArguments.value(), -100);
        assert_eq!(EngineErrorCode::DuplicateUserKey.value(), -130);
        assert_eq!(EngineErrorCode::Tokenize.value(), -208);
        assert_eq!(EngineErrorCode::IndexRename.value(), -310);
        assert_eq!(EngineErrorCode::DomainRemove.value(), -406);
    }

    #[test]
    fn test_symbolic_codes() {
        assert_eq!(
            EngineErrorCode::InvalidArguments.code(),
            "SEARCHD_CORE_INVALID_ARGUMENTS"
        );
        assert_eq!(
            EngineErrorCode::IndexTypeNotUserKey.code(),
            "SEARCHD_INDEX_TYPE_NOT_USER_KEY"
        );
    }

    #[test]
    fn test_display_contains_required_fields() {
        let err = EngineError::domain_missing("shop");
        let display = err.to_string();
        assert!(display.contains("[ERROR]"));
        assert!(display.contains("SEARCHD_DOMAIN_LOCATE"));
        assert!(display.contains("domain: shop"));
    }

    #[test]
    fn test_lock_errors_are_warnings() {
        assert_eq!(EngineError::read_lock().severity(), Severity::Warning);
        assert_eq!(EngineError::write_lock().code(), EngineErrorCode::WriteLock);
    }

    #[test]
    fn test_conversions() {
        let err: EngineError = RegistryError::AlreadyExists("title".into()).into();
        assert_eq!(err.code(), EngineErrorCode::IndexAlreadyExists);

        let err: EngineError = SearchIndexError::WrongType {
            key: "zip".into(),
            expected: "string",
        }
        .into();
        assert_eq!(err.code(), EngineErrorCode::IndexTypeInvalid);

        let err: EngineError = ContainerError::corrupt("bad").into();
        assert_eq!(err.code(), EngineErrorCode::DataRead);
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;
        let err = EngineError::io(
            EngineErrorCode::StateWrite,
            "write failed",
            io::Error::new(io::ErrorKind::Other, "disk full"),
        );
        assert!(err.source().is_some());
    }
}
