//! Observable events for searchd
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable engine events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Engine handle constructed
    EngineStart,
    /// Engine shutdown complete
    EngineStop,
    /// Worker thread entered its loop
    WorkerStart,
    /// Worker thread exited
    WorkerStop,

    // Configuration
    /// Configuration loaded from file
    ConfigLoaded,
    /// Excluded-word list loaded
    ExcludedWordsLoaded,
    /// Authentication configuration attached
    AuthenticationLoaded,

    // Catalog
    /// Index definition created
    IndexCreated,
    /// Index definition removed
    IndexRemoved,
    /// Index definition renamed
    IndexRenamed,
    /// Index definition reset to a new type
    IndexReset,
    /// Cached containers reindexed for a new definition
    IndexReindexed,
    /// Domain created
    DomainCreated,
    /// Domain renamed
    DomainRenamed,
    /// Domain removed
    DomainRemoved,

    // Mutation path
    /// A batch of queue entries was applied
    QueueBatch,
    /// A queue entry failed and was discarded
    QueueEntryFailed,
    /// Index maintenance failed for an attribute
    IndexMaintenanceFailed,
    /// Cache sweep evicted entries
    CacheSweep,

    // Query path
    /// A result set was reordered
    ResultsSorted,

    // Persistence
    /// State snapshot written
    StateWriteComplete,
    /// State snapshot failed
    StateWriteFailed,
    /// State snapshot restored
    StateRestoreComplete,
    /// Container snapshot written
    DataWriteComplete,
    /// Container snapshot failed
    DataWriteFailed,
    /// Container snapshot restored
    DataRestoreComplete,
    /// Container snapshot contained unreadable records
    DataCorruption,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::EngineStart => "SEARCHD_ENGINE_START",
            Event::EngineStop => "SEARCHD_ENGINE_STOP",
            Event::WorkerStart => "WORKER_START",
            Event::WorkerStop => "WORKER_STOP",

            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ExcludedWordsLoaded => "EXCLUDED_WORDS_LOADED",
            Event::AuthenticationLoaded => "AUTHENTICATION_LOADED",

            Event::IndexCreated => "INDEX_CREATED",
            Event::IndexRemoved => "INDEX_REMOVED",
            Event::IndexRenamed => "INDEX_RENAMED",
            Event::IndexReset => "INDEX_RESET",
            Event::IndexReindexed => "INDEX_REINDEXED",
            Event::DomainCreated => "DOMAIN_CREATED",
            Event::DomainRenamed => "DOMAIN_RENAMED",
            Event::DomainRemoved => "DOMAIN_REMOVED",

            Event::QueueBatch => "QUEUE_BATCH",
            Event::QueueEntryFailed => "QUEUE_ENTRY_FAILED",
            Event::IndexMaintenanceFailed => "INDEX_MAINTENANCE_FAILED",
            Event::CacheSweep => "CACHE_SWEEP",

            Event::ResultsSorted => "RESULTS_SORTED",

            Event::StateWriteComplete => "STATE_WRITE_COMPLETE",
            Event::StateWriteFailed => "STATE_WRITE_FAILED",
            Event::StateRestoreComplete => "STATE_RESTORE_COMPLETE",
            Event::DataWriteComplete => "DATA_WRITE_COMPLETE",
            Event::DataWriteFailed => "DATA_WRITE_FAILED",
            Event::DataRestoreComplete => "DATA_RESTORE_COMPLETE",
            Event::DataCorruption => "DATA_CORRUPTION",
        }
    }

    /// Returns true if the event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::QueueEntryFailed
                | Event::IndexMaintenanceFailed
                | Event::StateWriteFailed
                | Event::DataWriteFailed
                | Event::DataCorruption
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(Event::DomainCreated.as_str(), "DOMAIN_CREATED");
        assert_eq!(Event::DataCorruption.to_string(), "DATA_CORRUPTION");
    }

    #[test]
    fn test_failure_events() {
        assert!(Event::DataCorruption.is_failure());
        assert!(Event::QueueEntryFailed.is_failure());
        assert!(!Event::QueueBatch.is_failure());
    }
}
