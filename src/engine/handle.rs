//! Engine handle, shared state, and catalog management
//!
//! # Lock order
//!
//! engine state → container → storage of one index. The settings mutex
//! and the cache mutex are leaves: nothing else is acquired while they are
//! held. Cache disposal runs without the engine lock and takes it itself,
//! so code holding the engine lock takes containers out of the cache with
//! `take` and unindexes them directly.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::cache::{CacheStatus, ManagedCache};
use crate::container::StoredContainer;
use crate::observability::{log_event, log_event_with_fields, Event, Logger, MetricsRegistry, MetricsSnapshot};
use crate::ordered_index::OrderedIndex;
use crate::registry::{ExcludedWords, IndexDefinition, IndexRegistry, IndexType, TextDefaults};
use crate::search_index::{SearchIndex, SearchIndexError};
use crate::text::{build_index_string, EnglishStemmer, Stemmer};

use super::auth::{Authenticator, Permission, PermitAll, TokenAuthenticator, ValidationStrictness};
use super::config::EngineConfig;
use super::errors::{EngineError, EngineErrorCode, EngineResult};
use super::queue::MutationQueue;
use super::state_file::load_excluded_words;
use super::worker;

/// Attribute naming the domain a stored container belongs to
pub const DOMAIN_KEY_ATTRIBUTE: &str = "searchd_domainKey";

/// Cache key for a container uid
pub(crate) fn uid_key(uid: u32) -> Vec<u8> {
    uid.to_string().into_bytes()
}

/// Summary of one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainInfo {
    pub key: String,
    pub name: String,
    pub index_count: usize,
}

// ============================================================================
// Shared state
// ============================================================================

/// Registry plus the live domains, guarded by the engine lock
#[derive(Debug, Default)]
pub(crate) struct EngineState {
    pub(crate) registry: IndexRegistry,
    domains: Vec<Option<SearchIndex>>,
    domain_slots: OrderedIndex<usize>,
}

impl EngineState {
    pub(crate) fn domain(&self, key: &str) -> EngineResult<&SearchIndex> {
        let key = build_index_string(key);
        self.domain_slots
            .get(key.as_bytes())
            .and_then(|slot| self.domains.get(*slot))
            .and_then(Option::as_ref)
            .ok_or_else(|| EngineError::domain_missing(&key))
    }

    /// Live domains in creation order
    pub(crate) fn domains(&self) -> impl Iterator<Item = &SearchIndex> {
        self.domains.iter().flatten()
    }

    pub(crate) fn has_domain(&self, key: &str) -> bool {
        self.domain_slots.contains(build_index_string(key).as_bytes())
    }

    pub(crate) fn add_domain(&mut self, domain: SearchIndex) -> EngineResult<()> {
        let key = domain.key().to_string();
        if self.domain_slots.contains(key.as_bytes()) {
            return Err(
                EngineError::new(EngineErrorCode::DomainAlreadyExists, "domain already exists")
                    .with_details(format!("domain: {}", key)),
            );
        }
        self.domains.push(Some(domain));
        self.domain_slots
            .put(key.as_bytes(), self.domains.len() - 1)
            .map_err(|e| EngineError::new(EngineErrorCode::DomainCreate, e.to_string()))
    }

    fn remove_domain(&mut self, key: &str) -> EngineResult<SearchIndex> {
        let key = build_index_string(key);
        let slot = self
            .domain_slots
            .take(key.as_bytes())
            .ok_or_else(|| EngineError::domain_missing(&key))?;
        self.domains
            .get_mut(slot)
            .and_then(Option::take)
            .ok_or_else(|| EngineError::new(EngineErrorCode::DomainRemove, "domain slot is empty"))
    }

    fn rename_domain(&mut self, key: &str, new_key: &str, new_name: &str) -> EngineResult<()> {
        let key = build_index_string(key);
        if new_key != key && self.domain_slots.contains(new_key.as_bytes()) {
            return Err(
                EngineError::new(EngineErrorCode::DomainAlreadyExists, "domain already exists")
                    .with_details(format!("domain: {}", new_key)),
            );
        }
        let slot = self
            .domain_slots
            .take(key.as_bytes())
            .ok_or_else(|| EngineError::domain_missing(&key))?;
        if let Some(Some(domain)) = self.domains.get_mut(slot) {
            domain.rename(new_key, new_name);
        }
        self.domain_slots
            .put(new_key.as_bytes(), slot)
            .map_err(|e| EngineError::new(EngineErrorCode::DomainRename, e.to_string()))
    }
}

/// Runtime-adjustable settings
#[derive(Debug)]
pub(crate) struct EngineSettings {
    pub(crate) config: EngineConfig,
    pub(crate) uid_counter: u32,
    text: Arc<TextDefaults>,
}

impl EngineSettings {
    fn new(config: EngineConfig, excluded: Option<ExcludedWords>) -> Self {
        let text = Arc::new(TextDefaults {
            min_string_length: config.min_string_length,
            max_string_length: config.max_string_length,
            delimiters: config.string_delimiters.clone(),
            excluded_words: excluded,
        });
        Self {
            config,
            uid_counter: 0,
            text,
        }
    }

    /// Rebuild text defaults after the config changed
    pub(crate) fn refresh_text(&mut self, excluded: Option<ExcludedWords>) {
        self.text = Arc::new(TextDefaults {
            min_string_length: self.config.min_string_length,
            max_string_length: self.config.max_string_length,
            delimiters: self.config.string_delimiters.clone(),
            excluded_words: excluded,
        });
    }

    pub(crate) fn excluded_words(&self) -> Option<ExcludedWords> {
        self.text.excluded_words.clone()
    }

    pub(crate) fn next_uid(&mut self) -> u32 {
        self.uid_counter = self.uid_counter.wrapping_add(1).max(1);
        self.uid_counter
    }

    /// Keep generated uids above one supplied or restored
    pub(crate) fn observe_uid(&mut self, uid: u32) {
        self.uid_counter = self.uid_counter.max(uid);
    }
}

/// State shared between the handle, the worker, and the cache disposer
pub(crate) struct EngineInner {
    pub(crate) state: RwLock<EngineState>,
    pub(crate) settings: Mutex<EngineSettings>,
    pub(crate) cache: ManagedCache<Arc<StoredContainer>>,
    pub(crate) queue: MutationQueue,
    pub(crate) metrics: MetricsRegistry,
    pub(crate) stemmer: Box<dyn Stemmer>,
    authenticator: RwLock<Arc<dyn Authenticator>>,
    pub(crate) running: AtomicBool,
    pub(crate) lock_timeout: Duration,
    pub(crate) idle_wait: Duration,
}

impl EngineInner {
    pub(crate) fn read_state(&self) -> EngineResult<RwLockReadGuard<'_, EngineState>> {
        self.state
            .try_read_for(self.lock_timeout)
            .ok_or_else(EngineError::read_lock)
    }

    pub(crate) fn write_state(&self) -> EngineResult<RwLockWriteGuard<'_, EngineState>> {
        self.state
            .try_write_for(self.lock_timeout)
            .ok_or_else(EngineError::write_lock)
    }

    pub(crate) fn text(&self) -> Arc<TextDefaults> {
        Arc::clone(&self.settings.lock().text)
    }

    pub(crate) fn config(&self) -> EngineConfig {
        self.settings.lock().config.clone()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Cache disposer: unindex a container that left the cache and queue
    /// its release
    fn dispose_container(&self, stored: Arc<StoredContainer>) {
        match self.read_state() {
            Ok(state) => {
                if let Err(err) = self.unindex_with(&state, &stored) {
                    self.metrics.increment_index_failures();
                    log_event_with_fields(
                        Event::IndexMaintenanceFailed,
                        &[("uid", stored.uid().to_string().as_str()), ("error", err.to_string().as_str())],
                    );
                }
            }
            Err(err) => {
                self.metrics.increment_index_failures();
                log_event_with_fields(
                    Event::IndexMaintenanceFailed,
                    &[("uid", stored.uid().to_string().as_str()), ("error", err.to_string().as_str())],
                );
            }
        }
        self.queue.enqueue_free(stored);
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Embeddable search engine.
///
/// Owns the background worker; dropping the handle shuts the engine down
/// after the queue drains. Share it across threads behind an `Arc`.
pub struct SearchEngine {
    pub(crate) inner: Arc<EngineInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SearchEngine {
    /// Engine with the English stemmer
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        Self::with_stemmer(config, Box::new(EnglishStemmer::new()))
    }

    pub fn with_stemmer(config: EngineConfig, stemmer: Box<dyn Stemmer>) -> EngineResult<Self> {
        config.validate()?;

        let excluded = if config.excluded_words_path.exists() {
            match load_excluded_words(&config.excluded_words_path, stemmer.as_ref()) {
                Ok(words) => Some(words),
                Err(err) => {
                    Logger::warn(
                        Event::ExcludedWordsLoaded.as_str(),
                        &[("outcome", "failed"), ("error", err.to_string().as_str())],
                    );
                    None
                }
            }
        } else {
            None
        };

        let authenticator: Arc<dyn Authenticator> = if config.authentication_path.exists() {
            let auth = TokenAuthenticator::load(&config.authentication_path)?;
            log_event_with_fields(
                Event::AuthenticationLoaded,
                &[("grants", auth.len().to_string().as_str())],
            );
            Arc::new(auth)
        } else {
            Arc::new(PermitAll)
        };

        let cache_config = config.cache_config();
        let queue_capacity = config.queue_capacity;
        let lock_timeout = config.lock_timeout();
        let idle_wait = config.worker_idle_wait();

        let inner = Arc::new_cyclic(|weak: &Weak<EngineInner>| {
            let weak = weak.clone();
            EngineInner {
                state: RwLock::new(EngineState::default()),
                settings: Mutex::new(EngineSettings::new(config, excluded)),
                cache: ManagedCache::with_disposer(cache_config, move |stored| {
                    if let Some(inner) = weak.upgrade() {
                        inner.dispose_container(stored);
                    }
                }),
                queue: MutationQueue::new(queue_capacity),
                metrics: MetricsRegistry::new(),
                stemmer,
                authenticator: RwLock::new(authenticator),
                running: AtomicBool::new(true),
                lock_timeout,
                idle_wait,
            }
        });

        let handle = {
            let inner = Arc::clone(&inner);
            thread::Builder::new()
                .name("searchd-worker".to_string())
                .spawn(move || worker::run(inner))
                .map_err(|e| {
                    EngineError::io(
                        EngineErrorCode::FailedToInitConfig,
                        "failed to start worker thread",
                        e,
                    )
                })?
        };

        log_event(Event::EngineStart);
        Ok(Self {
            inner,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Engine configured from a JSON file
    pub fn from_config_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        Self::new(EngineConfig::load(path)?)
    }

    /// Stop accepting deferred work, drain the queue, and join the worker.
    /// Calling it again does nothing.
    pub fn shutdown(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            self.inner.running.store(false, Ordering::Release);
            if handle.join().is_err() {
                Logger::error(Event::WorkerStop.as_str(), &[("outcome", "panicked")]);
            }
            log_event(Event::EngineStop);
        }
    }

    /// Wait until every deferred mutation submitted so far is applied
    pub fn sync(&self, timeout: Duration) -> bool {
        self.inner.queue.wait_idle(timeout)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn cache_status(&self) -> CacheStatus {
        self.inner.cache.status()
    }

    /// Number of cached containers
    pub fn container_count(&self) -> usize {
        self.inner.cache.len()
    }

    /// Deferred mutations not yet applied
    pub fn pending(&self) -> usize {
        self.inner.queue.pending()
    }

    /// Entries waiting in the queue that the worker has not picked up
    pub fn queue_depth(&self) -> usize {
        self.inner.queue.len()
    }

    /// Current settings
    pub fn config(&self) -> EngineConfig {
        self.inner.config()
    }

    // ------------------------------------------------------------------
    // Authentication
    // ------------------------------------------------------------------

    pub fn set_authenticator(&self, authenticator: Arc<dyn Authenticator>) {
        *self.inner.authenticator.write() = authenticator;
        log_event(Event::AuthenticationLoaded);
    }

    pub fn is_permitted(
        &self,
        token: &str,
        domain_key: &str,
        ip_address: &str,
        permission: Permission,
    ) -> bool {
        let authenticator = self.inner.authenticator.read().clone();
        authenticator.is_permitted(token, domain_key, ip_address, permission)
    }

    // ------------------------------------------------------------------
    // Domains
    // ------------------------------------------------------------------

    /// Create a domain with storage for every registered index
    pub fn new_domain(&self, key: &str, name: &str) -> EngineResult<()> {
        let key = build_index_string(key);
        if key.is_empty() {
            return Err(EngineError::invalid_arguments("domain key is empty"));
        }
        let mut state = self.inner.write_state()?;
        let domain = SearchIndex::new(&key, name, state.registry.iter());
        state.add_domain(domain)?;
        log_event_with_fields(Event::DomainCreated, &[("domain", key.as_str())]);
        Ok(())
    }

    /// Rename a domain; cached containers follow it
    pub fn rename_domain(&self, key: &str, new_key: &str, new_name: &str) -> EngineResult<()> {
        let old_key = build_index_string(key);
        let new_key = build_index_string(new_key);
        if new_key.is_empty() {
            return Err(EngineError::invalid_arguments("domain key is empty"));
        }
        self.inner
            .write_state()?
            .rename_domain(&old_key, &new_key, new_name)?;

        if old_key != new_key {
            for stored in self.inner.cache.values() {
                let mut container = stored
                    .try_write_for(self.inner.lock_timeout)
                    .ok_or_else(|| EngineError::container_lock(stored.uid()))?;
                if container.get_string(DOMAIN_KEY_ATTRIBUTE).as_deref() == Some(old_key.as_str()) {
                    container.set_string(DOMAIN_KEY_ATTRIBUTE, &new_key)?;
                    let memory = container.memory_length();
                    drop(container);
                    // The entry may have been evicted meanwhile
                    let _ = self.inner.cache.update_memory(&uid_key(stored.uid()), memory);
                }
            }
        }
        log_event_with_fields(
            Event::DomainRenamed,
            &[("from", old_key.as_str()), ("to", new_key.as_str())],
        );
        Ok(())
    }

    /// Remove a domain and drop its cached containers
    pub fn remove_domain(&self, key: &str) -> EngineResult<()> {
        let key = build_index_string(key);
        self.inner.write_state()?.remove_domain(&key)?;

        for stored in self.inner.cache.values() {
            let belongs = stored
                .try_read_for(self.inner.lock_timeout)
                .map(|c| c.get_string(DOMAIN_KEY_ATTRIBUTE).as_deref() == Some(key.as_str()))
                .unwrap_or(false);
            if belongs {
                if let Some(taken) = self.inner.cache.take(&uid_key(stored.uid())) {
                    self.inner.queue.enqueue_free(taken);
                }
            }
        }
        log_event_with_fields(Event::DomainRemoved, &[("domain", key.as_str())]);
        Ok(())
    }

    pub fn domains(&self) -> EngineResult<Vec<DomainInfo>> {
        let state = self.inner.read_state()?;
        Ok(state
            .domains()
            .map(|d| DomainInfo {
                key: d.key().to_string(),
                name: d.name().to_string(),
                index_count: d.index_len(),
            })
            .collect())
    }

    pub fn has_domain(&self, key: &str) -> EngineResult<bool> {
        Ok(self.inner.read_state()?.has_domain(key))
    }

    // ------------------------------------------------------------------
    // Index definitions
    // ------------------------------------------------------------------

    /// Define an index in every domain and index cached containers into it
    pub fn new_index(&self, index_type: IndexType, key: &str, name: &str) -> EngineResult<()> {
        let mut state = self.inner.write_state()?;
        let definition = state.registry.define(index_type, key, name)?.clone();
        for domain in state.domains() {
            domain
                .new_index(&definition)
                .map_err(|e| EngineError::new(EngineErrorCode::DomainCreateIndex, e.to_string()))?;
        }
        log_event_with_fields(
            Event::IndexCreated,
            &[("index", definition.key.as_str()), ("type", definition.index_type.as_str())],
        );

        let state = RwLockWriteGuard::downgrade(state);
        self.inner.reindex(&state, &definition);
        Ok(())
    }

    /// Give an index a new key and name. Stored entries move with it in
    /// every domain; the type stays as it is.
    pub fn rename_index(&self, key: &str, new_key: &str, new_name: &str) -> EngineResult<()> {
        let mut state = self.inner.write_state()?;
        let index_type = state
            .registry
            .get(key)
            .map(|definition| definition.index_type)
            .ok_or_else(|| EngineError::index_missing(key))?;
        let previous = state
            .registry
            .rename(key, index_type, new_key, new_name)
            .map_err(|e| match EngineError::from(e) {
                err if err.code() == EngineErrorCode::IndexLocate => err,
                err if err.code() == EngineErrorCode::IndexAlreadyExists => err,
                err => EngineError::new(EngineErrorCode::IndexRename, err.message().to_string()),
            })?;
        let current = state
            .registry
            .get(new_key)
            .cloned()
            .ok_or_else(|| EngineError::index_missing(new_key))?;

        if previous.key != current.key {
            for domain in state.domains() {
                domain.rename_index(&previous.key, &current).map_err(|e| {
                    EngineError::new(EngineErrorCode::IndexRename, e.to_string())
                        .with_details(format!("domain: {}", domain.key()))
                })?;
            }
        }
        log_event_with_fields(
            Event::IndexRenamed,
            &[("from", previous.key.as_str()), ("to", current.key.as_str())],
        );
        Ok(())
    }

    /// Replace an index with a fresh definition: remove it, define the new
    /// one, and index cached containers into it. The type may change.
    pub fn reset_index(
        &self,
        key: &str,
        new_type: IndexType,
        new_key: &str,
        new_name: &str,
    ) -> EngineResult<()> {
        let new_key = build_index_string(new_key);
        if new_key != build_index_string(key) && self.inner.read_state()?.registry.contains(&new_key) {
            return Err(EngineError::new(
                EngineErrorCode::IndexAlreadyExists,
                "index already exists",
            )
            .with_details(format!("index: {}", new_key)));
        }
        self.remove_index(key)?;
        self.new_index(new_type, &new_key, new_name)?;
        log_event_with_fields(
            Event::IndexReset,
            &[
                ("from", build_index_string(key).as_str()),
                ("to", new_key.as_str()),
                ("type", new_type.as_str()),
            ],
        );
        Ok(())
    }

    pub fn remove_index(&self, key: &str) -> EngineResult<()> {
        let mut state = self.inner.write_state()?;
        let definition = state.registry.remove(key)?;
        for domain in state.domains() {
            match domain.remove_index(&definition.key) {
                Ok(()) | Err(SearchIndexError::IndexNotFound(_)) => {}
                Err(e) => {
                    return Err(EngineError::new(EngineErrorCode::IndexRemove, e.to_string()))
                }
            }
        }
        log_event_with_fields(Event::IndexRemoved, &[("index", definition.key.as_str())]);
        Ok(())
    }

    pub fn index_definition(&self, key: &str) -> EngineResult<IndexDefinition> {
        self.inner
            .read_state()?
            .registry
            .get(key)
            .cloned()
            .ok_or_else(|| EngineError::index_missing(key))
    }

    pub fn index_definitions(&self) -> EngineResult<Vec<IndexDefinition>> {
        Ok(self.inner.read_state()?.registry.definitions())
    }

    /// Override min/max string lengths for one index and rebuild it
    pub fn set_index_string_lengths(
        &self,
        key: &str,
        min: Option<usize>,
        max: Option<usize>,
    ) -> EngineResult<()> {
        self.modify_definition(key, |registry| registry.set_string_lengths(key, min, max))
    }

    pub fn set_index_delimiters(&self, key: &str, delimiters: Option<&str>) -> EngineResult<()> {
        self.modify_definition(key, |registry| {
            registry.set_delimiters(key, delimiters.map(str::to_string))
        })
    }

    /// Load an excluded words file for one index, or clear it with `None`
    pub fn set_index_excluded_words(&self, key: &str, path: Option<&Path>) -> EngineResult<()> {
        let excluded = match path {
            Some(path) => Some(load_excluded_words(path, self.inner.stemmer.as_ref())?),
            None => None,
        };
        self.modify_definition(key, |registry| registry.set_excluded_words(key, excluded))
    }

    pub fn set_index_flags(&self, key: &str, full_string: bool, tokenized: bool) -> EngineResult<()> {
        self.modify_definition(key, |registry| {
            registry.set_indexing_flags(key, full_string, tokenized)
        })
    }

    fn modify_definition<F>(&self, key: &str, modify: F) -> EngineResult<()>
    where
        F: FnOnce(&mut IndexRegistry) -> crate::registry::RegistryResult<()>,
    {
        let mut state = self.inner.write_state()?;
        modify(&mut state.registry)?;
        let definition = state
            .registry
            .get(key)
            .cloned()
            .ok_or_else(|| EngineError::index_missing(key))?;
        let state = RwLockWriteGuard::downgrade(state);
        self.inner.rebuild(&state, &definition)
    }

    // ------------------------------------------------------------------
    // Engine-wide settings
    // ------------------------------------------------------------------

    /// Change the default string lengths and rebuild every index
    pub fn set_string_lengths(&self, min: usize, max: usize) -> EngineResult<()> {
        if min == 0 || min > max {
            return Err(EngineError::invalid_arguments("invalid string length bounds")
                .with_details(format!("min: {}, max: {}", min, max)));
        }
        self.modify_text(|config| {
            config.min_string_length = min;
            config.max_string_length = max;
        })
    }

    pub fn set_delimiters(&self, delimiters: &str) -> EngineResult<()> {
        if delimiters.is_empty() {
            return Err(EngineError::invalid_arguments("empty delimiter set"));
        }
        self.modify_text(|config| config.string_delimiters = delimiters.to_string())
    }

    /// Load the engine-wide excluded words file and rebuild every index
    pub fn set_excluded_words_path(&self, path: &Path) -> EngineResult<()> {
        let excluded = load_excluded_words(path, self.inner.stemmer.as_ref())?;
        {
            let mut settings = self.inner.settings.lock();
            settings.config.excluded_words_path = path.to_path_buf();
            settings.refresh_text(Some(excluded));
        }
        self.rebuild_all()
    }

    fn modify_text<F: FnOnce(&mut EngineConfig)>(&self, modify: F) -> EngineResult<()> {
        {
            let mut settings = self.inner.settings.lock();
            modify(&mut settings.config);
            let excluded = settings.excluded_words();
            settings.refresh_text(excluded);
        }
        self.rebuild_all()
    }

    pub(crate) fn rebuild_all(&self) -> EngineResult<()> {
        let state = self.inner.read_state()?;
        for definition in state.registry.definitions() {
            self.inner.rebuild(&state, &definition)?;
        }
        Ok(())
    }

    /// Change cache ceilings; the next sweep enforces them
    pub fn set_cache_limits(&self, max_count: usize, max_memory_kib: usize, timeout_secs: u64) {
        let cache_config = {
            let mut settings = self.inner.settings.lock();
            settings.config.max_container_count = max_count;
            settings.config.max_container_memory_length = max_memory_kib;
            settings.config.container_timeout = timeout_secs;
            settings.config.cache_config()
        };
        self.inner.cache.set_config(cache_config);
    }

    pub fn set_backup(
        &self,
        state_threshold_secs: u64,
        state_path: &Path,
        container_threshold_secs: u64,
        container_path: &Path,
    ) {
        let mut settings = self.inner.settings.lock();
        settings.config.state_write_threshold = state_threshold_secs;
        settings.config.state_path = state_path.to_path_buf();
        settings.config.container_write_threshold = container_threshold_secs;
        settings.config.container_path = container_path.to_path_buf();
    }

    pub fn set_max_sort_memory(&self, bytes: usize) {
        self.inner.settings.lock().config.max_sort_operation_memory_length = bytes;
    }

    pub fn set_validation_strictness(&self, strictness: ValidationStrictness) {
        self.inner.settings.lock().config.validation_strictness = strictness;
    }

    pub fn set_authentication_path(&self, path: &Path) -> EngineResult<()> {
        let auth = TokenAuthenticator::load(path)?;
        self.inner.settings.lock().config.authentication_path = path.to_path_buf();
        self.set_authenticator(Arc::new(auth));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    /// Distinct keys stored for an index in a domain
    pub fn index_count(&self, domain_key: &str, index_key: &str) -> EngineResult<usize> {
        let state = self.inner.read_state()?;
        let key = build_index_string(index_key);
        Ok(state.domain(domain_key)?.index_count(&key)?)
    }

    /// Distinct containers stored for an index in a domain
    pub fn unique_value_count(&self, domain_key: &str, index_key: &str) -> EngineResult<usize> {
        let state = self.inner.read_state()?;
        let key = build_index_string(index_key);
        Ok(state.domain(domain_key)?.unique_value_count(&key)?)
    }

    /// Every stored key with its container count
    pub fn value_summary(
        &self,
        domain_key: &str,
        index_key: &str,
    ) -> EngineResult<Vec<(String, usize)>> {
        let state = self.inner.read_state()?;
        let key = build_index_string(index_key);
        Ok(state.domain(domain_key)?.value_summary(&key)?)
    }
}

impl Drop for SearchEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("cache", &self.inner.cache)
            .field("pending", &self.inner.queue.pending())
            .field("queued", &self.inner.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SearchEngine {
        SearchEngine::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_domain_lifecycle() {
        let engine = engine();
        engine.new_domain("Shop", "Shop").unwrap();
        assert!(engine.has_domain("shop").unwrap());

        let err = engine.new_domain("shop", "again").unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::DomainAlreadyExists);

        engine.rename_domain("shop", "store", "Store").unwrap();
        assert!(!engine.has_domain("shop").unwrap());
        let domains = engine.domains().unwrap();
        assert_eq!(domains.len(), 1);
        assert_eq!(domains[0].key, "store");
        assert_eq!(domains[0].name, "Store");

        engine.remove_domain("store").unwrap();
        assert!(engine.domains().unwrap().is_empty());
        let err = engine.remove_domain("store").unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::DomainLocate);
    }

    #[test]
    fn test_new_domain_gets_existing_indexes() {
        let engine = engine();
        engine.new_index(IndexType::Exact, "title", "Title").unwrap();
        engine.new_index(IndexType::Range, "price", "Price").unwrap();
        engine.new_domain("default", "Default").unwrap();
        assert_eq!(engine.domains().unwrap()[0].index_count, 2);

        engine.new_index(IndexType::Wildcard, "body", "Body").unwrap();
        assert_eq!(engine.domains().unwrap()[0].index_count, 3);
    }

    #[test]
    fn test_index_definition_management() {
        let engine = engine();
        engine.new_domain("default", "Default").unwrap();
        engine.new_index(IndexType::Exact, "title", "Title").unwrap();

        let err = engine.new_index(IndexType::Exact, "TITLE", "dup").unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::IndexAlreadyExists);

        engine
            .reset_index("title", IndexType::Wildcard, "heading", "Heading")
            .unwrap();
        let def = engine.index_definition("heading").unwrap();
        assert_eq!(def.index_type, IndexType::Wildcard);
        assert_eq!(engine.index_count("default", "heading").unwrap(), 0);
        assert_eq!(
            engine.index_definition("title").unwrap_err().code(),
            EngineErrorCode::IndexLocate
        );

        engine.remove_index("heading").unwrap();
        assert!(engine.index_definitions().unwrap().is_empty());
        assert_eq!(
            engine.remove_index("heading").unwrap_err().code(),
            EngineErrorCode::IndexLocate
        );
    }

    #[test]
    fn test_settings_validation() {
        let engine = engine();
        assert!(engine.set_string_lengths(5, 2).is_err());
        assert!(engine.set_delimiters("").is_err());
        engine.set_string_lengths(2, 24).unwrap();
        let config = engine.config();
        assert_eq!(config.min_string_length, 2);
        assert_eq!(config.max_string_length, 24);

        engine.set_cache_limits(10, 1, 60);
        assert_eq!(engine.cache_status().max_items, 10);
        assert_eq!(engine.cache_status().max_memory, 1024);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let engine = engine();
        engine.shutdown();
        engine.shutdown();
        assert!(engine.sync(Duration::from_millis(10)));
        assert_eq!(engine.queue_depth(), 0);
    }

    #[test]
    fn test_queue_depth_after_drain() {
        let engine = engine();
        engine.new_domain("default", "Default").unwrap();
        for _ in 0..5 {
            engine
                .put("default", crate::Container::new("doc"), crate::WriteMode::Deferred)
                .unwrap();
        }
        assert!(engine.queue_depth() <= 5);
        assert!(engine.sync(Duration::from_secs(5)));
        assert_eq!(engine.queue_depth(), 0);
        assert_eq!(engine.pending(), 0);
        assert_eq!(engine.container_count(), 5);
    }

    #[test]
    fn test_uid_counter() {
        let mut settings = EngineSettings::new(EngineConfig::default(), None);
        assert_eq!(settings.next_uid(), 1);
        settings.observe_uid(40);
        assert_eq!(settings.next_uid(), 41);
        settings.observe_uid(3);
        assert_eq!(settings.next_uid(), 42);
    }
}
