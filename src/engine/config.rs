//! Engine configuration
//!
//! Every field has a serde default, so a partial JSON document loads
//! cleanly. Field names in JSON are camelCase to match the state file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;

use super::auth::ValidationStrictness;
use super::errors::{EngineError, EngineErrorCode, EngineResult};

/// Search engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Maximum cached containers (default: 65536)
    #[serde(default = "default_max_container_count")]
    pub max_container_count: usize,

    /// Aggregate container memory ceiling in KiB (default: 65536)
    #[serde(default = "default_max_container_memory_length")]
    pub max_container_memory_length: usize,

    /// Idle seconds before a container expires (default: 65536)
    #[serde(default = "default_container_timeout")]
    pub container_timeout: u64,

    /// Engine-wide minimum indexed string length (default: 3)
    #[serde(default = "default_min_string_length")]
    pub min_string_length: usize,

    /// Engine-wide maximum indexed string length (default: 18)
    #[serde(default = "default_max_string_length")]
    pub max_string_length: usize,

    /// Byte budget for relevancy ordering (default: 8 MiB)
    #[serde(default = "default_max_sort_operation_memory_length")]
    pub max_sort_operation_memory_length: usize,

    /// Engine-wide token delimiters
    #[serde(default = "default_string_delimiters")]
    pub string_delimiters: String,

    /// Seconds between state snapshots (default: 1200)
    #[serde(default = "default_write_threshold")]
    pub state_write_threshold: u64,

    /// Directory for state snapshots
    #[serde(default = "default_backup_path")]
    pub state_path: PathBuf,

    /// Seconds between container snapshots (default: 1200)
    #[serde(default = "default_write_threshold")]
    pub container_write_threshold: u64,

    /// Directory for container snapshots
    #[serde(default = "default_backup_path")]
    pub container_path: PathBuf,

    /// Engine-wide excluded words file
    #[serde(default = "default_excluded_words_path")]
    pub excluded_words_path: PathBuf,

    /// Authentication configuration handed to the authenticator
    #[serde(default = "default_authentication_path")]
    pub authentication_path: PathBuf,

    /// How strictly JSON front ends validate requests (default: warning)
    #[serde(default)]
    pub validation_strictness: ValidationStrictness,

    /// Pending mutation capacity (default: 65536)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Engine and container lock wait in milliseconds (default: 5000)
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Worker wait for new entries in milliseconds (default: 10)
    #[serde(default = "default_worker_idle_wait_ms")]
    pub worker_idle_wait_ms: u64,
}

fn default_max_container_count() -> usize {
    65536
}

fn default_max_container_memory_length() -> usize {
    65536
}

fn default_container_timeout() -> u64 {
    65536
}

fn default_min_string_length() -> usize {
    3
}

fn default_max_string_length() -> usize {
    18
}

fn default_max_sort_operation_memory_length() -> usize {
    8_388_608
}

fn default_string_delimiters() -> String {
    " |~,;:.][)(}{*@!&-_".to_string()
}

fn default_write_threshold() -> u64 {
    1200
}

fn default_backup_path() -> PathBuf {
    PathBuf::from("assets/data/searchd")
}

fn default_excluded_words_path() -> PathBuf {
    PathBuf::from("conf/searchd.excluded.words.default.config")
}

fn default_authentication_path() -> PathBuf {
    PathBuf::from("conf/searchd.authentication.default.json")
}

fn default_queue_capacity() -> usize {
    65536
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

fn default_worker_idle_wait_ms() -> u64 {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_container_count: default_max_container_count(),
            max_container_memory_length: default_max_container_memory_length(),
            container_timeout: default_container_timeout(),
            min_string_length: default_min_string_length(),
            max_string_length: default_max_string_length(),
            max_sort_operation_memory_length: default_max_sort_operation_memory_length(),
            string_delimiters: default_string_delimiters(),
            state_write_threshold: default_write_threshold(),
            state_path: default_backup_path(),
            container_write_threshold: default_write_threshold(),
            container_path: default_backup_path(),
            excluded_words_path: default_excluded_words_path(),
            authentication_path: default_authentication_path(),
            validation_strictness: ValidationStrictness::default(),
            queue_capacity: default_queue_capacity(),
            lock_timeout_ms: default_lock_timeout_ms(),
            worker_idle_wait_ms: default_worker_idle_wait_ms(),
        }
    }
}

impl EngineConfig {
    /// Load a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            EngineError::io(
                EngineErrorCode::FailedToInitConfig,
                "failed to read configuration",
                e,
            )
            .with_details(path.display().to_string())
        })?;
        let config = Self::from_json_str(&text)?;
        crate::observability::log_event_with_fields(
            crate::observability::Event::ConfigLoaded,
            &[("path", path.display().to_string().as_str())],
        );
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(text).map_err(|e| {
            EngineError::new(EngineErrorCode::FailedToInitConfig, "invalid configuration")
                .with_source(e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> EngineResult<()> {
        if self.min_string_length == 0 || self.min_string_length > self.max_string_length {
            return Err(EngineError::invalid_arguments("invalid string length bounds")
                .with_details(format!(
                    "min: {}, max: {}",
                    self.min_string_length, self.max_string_length
                )));
        }
        if self.string_delimiters.is_empty() {
            return Err(EngineError::invalid_arguments("empty delimiter set"));
        }
        if self.queue_capacity == 0 {
            return Err(EngineError::invalid_arguments("queue capacity must be positive"));
        }
        Ok(())
    }

    /// Use `dir` for both state and container snapshots
    pub fn with_backup_path(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.state_path = dir.clone();
        self.container_path = dir;
        self
    }

    pub fn with_cache_limits(mut self, count: usize, memory_kib: usize, timeout_secs: u64) -> Self {
        self.max_container_count = count;
        self.max_container_memory_length = memory_kib;
        self.container_timeout = timeout_secs;
        self
    }

    pub fn with_string_lengths(mut self, min: usize, max: usize) -> Self {
        self.min_string_length = min;
        self.max_string_length = max;
        self
    }

    pub fn with_delimiters(mut self, delimiters: impl Into<String>) -> Self {
        self.string_delimiters = delimiters.into();
        self
    }

    pub fn with_excluded_words_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded_words_path = path.into();
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn worker_idle_wait(&self) -> Duration {
        Duration::from_millis(self.worker_idle_wait_ms)
    }

    pub fn state_write_interval(&self) -> Duration {
        Duration::from_secs(self.state_write_threshold)
    }

    pub fn container_write_interval(&self) -> Duration {
        Duration::from_secs(self.container_write_threshold)
    }

    /// Cache ceilings derived from the container settings
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_items: self.max_container_count,
            max_memory: self.max_container_memory_length.saturating_mul(1024),
            timeout: Duration::from_secs(self.container_timeout),
        }
    }
}
