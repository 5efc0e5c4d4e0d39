//! Container mutations: put, update, delete, and checkout
//!
//! # Invariants
//!
//! - A stored container always has a non-zero uid and a domain key
//! - Within a domain, a user-key value belongs to at most one container
//! - The cache holds at most one version per uid; replacing it unindexes
//!   the old version first

use std::sync::Arc;

use crate::container::{combine, CombinePolicy, Container, ContainerGuard, StoredContainer};
use crate::registry::IndexType;
use crate::search_index::{indexed_attributes, SearchIndex};

use super::handle::{uid_key, EngineInner, EngineState, SearchEngine, DOMAIN_KEY_ATTRIBUTE};
use super::errors::{EngineError, EngineErrorCode, EngineResult};
use super::indexing::{calculate_relevancy, strip_relevancy};
use super::queue::QueueEntry;
use crate::observability::{log_event_with_fields, Event};

/// When a mutation takes effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Applied before the call returns
    #[default]
    Immediate,
    /// Queued for the worker; `sync` waits for it
    Deferred,
}

impl SearchEngine {
    /// Store `container` in a domain and index it. Returns its uid, which
    /// is assigned when the container has none.
    pub fn put(&self, domain_key: &str, mut container: Container, mode: WriteMode) -> EngineResult<u32> {
        if container.exists(DOMAIN_KEY_ATTRIBUTE) {
            return Err(reserved_key());
        }

        let state = self.inner.read_state()?;
        let domain = state.domain(domain_key)?;

        let uid = {
            let mut settings = self.inner.settings.lock();
            if container.uid() == 0 {
                let uid = settings.next_uid();
                container.set_uid(uid)?;
                uid
            } else {
                settings.observe_uid(container.uid());
                container.uid()
            }
        };
        container.set_string(DOMAIN_KEY_ATTRIBUTE, domain.key())?;

        match mode {
            WriteMode::Immediate => {
                self.inner.apply_put_locked(&state, container)?;
                self.inner.metrics.increment_puts();
            }
            WriteMode::Deferred => {
                self.inner.check_user_keys(&state, domain, &container)?;
                drop(state);
                self.inner.enqueue(QueueEntry::Put(container))?;
            }
        }
        Ok(uid)
    }

    /// Combine `container` onto the stored version with the same uid
    pub fn update(
        &self,
        container: Container,
        policy: CombinePolicy,
        mode: WriteMode,
    ) -> EngineResult<u32> {
        let uid = container.uid();
        if uid == 0 {
            return Err(EngineError::new(EngineErrorCode::MissingUid, "update requires a uid"));
        }
        if container.exists(DOMAIN_KEY_ATTRIBUTE) {
            return Err(reserved_key());
        }

        match mode {
            WriteMode::Immediate => {
                let state = self.inner.read_state()?;
                self.inner.apply_update_locked(&state, container, policy)?;
                self.inner.metrics.increment_updates();
            }
            WriteMode::Deferred => {
                if !self.inner.cache.contains(&uid_key(uid)) {
                    return Err(EngineError::container_missing(uid));
                }
                self.inner.enqueue(QueueEntry::Update(container, policy))?;
            }
        }
        Ok(uid)
    }

    /// Update the container owning a user-key value
    pub fn update_by_attribute(
        &self,
        attribute_key: &str,
        value: &str,
        mut container: Container,
        policy: CombinePolicy,
        mode: WriteMode,
    ) -> EngineResult<u32> {
        let uid = {
            let state = self.inner.read_state()?;
            self.inner.resolve_user_key(&state, attribute_key, value)?
        };
        if container.uid() != 0 && container.uid() != uid {
            return Err(EngineError::invalid_arguments("uid does not match the user key owner")
                .with_details(format!("uid: {}, owner: {}", container.uid(), uid)));
        }
        container.set_uid(uid)?;
        self.update(container, policy, mode)
    }

    /// Remove a container from the cache and every index
    pub fn delete(&self, uid: u32) -> EngineResult<()> {
        if uid == 0 {
            return Err(EngineError::new(EngineErrorCode::MissingUid, "delete requires a uid"));
        }
        self.inner
            .cache
            .remove(&uid_key(uid))
            .map_err(|_| EngineError::container_missing(uid))?;
        self.inner.metrics.increment_deletes();
        Ok(())
    }

    /// Delete the container owning a user-key value; returns its uid
    pub fn delete_by_attribute(&self, attribute_key: &str, value: &str) -> EngineResult<u32> {
        let uid = {
            let state = self.inner.read_state()?;
            self.inner.resolve_user_key(&state, attribute_key, value)?
        };
        self.delete(uid)?;
        Ok(uid)
    }

    /// Check a container out. It cannot be evicted until the guard is
    /// dropped or passed to `unlock_get`.
    pub fn get(&self, uid: u32) -> EngineResult<ContainerGuard> {
        if uid == 0 {
            return Err(EngineError::new(EngineErrorCode::MissingUid, "get requires a uid"));
        }
        let stored = self
            .inner
            .cache
            .get(&uid_key(uid))
            .ok_or_else(|| EngineError::container_missing(uid))?;
        Ok(stored.pin())
    }

    pub fn get_by_attribute(&self, attribute_key: &str, value: &str) -> EngineResult<ContainerGuard> {
        let uid = {
            let state = self.inner.read_state()?;
            self.inner.resolve_user_key(&state, attribute_key, value)?
        };
        self.get(uid)
    }

    /// Release a checked-out container
    pub fn unlock_get(&self, guard: ContainerGuard) {
        drop(guard);
    }

    /// Evict every cached container, unindexing each
    pub fn clear_containers(&self) {
        self.inner.cache.clear();
    }
}

fn reserved_key() -> EngineError {
    EngineError::new(EngineErrorCode::HasReservedKey, "container carries a reserved attribute")
        .with_details(format!("attribute: {}", DOMAIN_KEY_ATTRIBUTE))
}

impl EngineInner {
    /// Queue a deferred mutation
    pub(crate) fn enqueue(&self, entry: QueueEntry) -> EngineResult<()> {
        if !self.is_running() {
            return Err(EngineError::new(EngineErrorCode::FailedToPut, "engine is shut down"));
        }
        self.queue.enqueue(entry, self.lock_timeout)
    }

    /// Apply one queue entry on the worker thread
    pub(crate) fn apply_entry(&self, entry: QueueEntry) -> EngineResult<()> {
        match entry {
            QueueEntry::Free(stored) => {
                drop(stored);
                self.metrics.increment_frees();
            }
            QueueEntry::Put(container) => {
                let state = self.read_state()?;
                self.apply_put_locked(&state, container)?;
                self.metrics.increment_puts();
            }
            QueueEntry::Update(container, policy) => {
                let state = self.read_state()?;
                self.apply_update_locked(&state, container, policy)?;
                self.metrics.increment_updates();
            }
        }
        Ok(())
    }

    /// Cache and index a container that already carries its uid and
    /// domain key, replacing any cached version
    pub(crate) fn apply_put_locked(&self, state: &EngineState, mut container: Container) -> EngineResult<()> {
        let uid = container.uid();
        if uid == 0 {
            return Err(EngineError::new(EngineErrorCode::MissingUid, "container has no uid"));
        }
        let domain_key = container.get_string(DOMAIN_KEY_ATTRIBUTE).ok_or_else(|| {
            EngineError::new(EngineErrorCode::MissingAttribute, "container has no domain")
                .with_details(format!("uid: {}", uid))
        })?;
        let domain = state.domain(&domain_key)?;
        self.check_user_keys(state, domain, &container)?;

        let text = self.text();
        calculate_relevancy(&state.registry, &text, self.stemmer.as_ref(), &mut container)?;

        let key = uid_key(uid);
        if let Some(previous) = self.cache.take(&key) {
            if let Err(err) = self.unindex_with(state, &previous) {
                self.metrics.increment_index_failures();
                log_event_with_fields(
                    Event::IndexMaintenanceFailed,
                    &[("uid", uid.to_string().as_str()), ("error", err.to_string().as_str())],
                );
            }
            self.queue.enqueue_free(previous);
        }

        let memory = container.memory_length();
        let stored = Arc::new(StoredContainer::new(container));
        self.cache
            .put(&key, Arc::clone(&stored), memory)
            .map_err(|e| {
                EngineError::new(EngineErrorCode::FailedToPut, e.to_string())
                    .with_details(format!("uid: {}", uid))
            })?;
        self.index_with(state, &stored)
    }

    /// Combine `overlay` onto the cached version and re-put the result
    pub(crate) fn apply_update_locked(
        &self,
        state: &EngineState,
        overlay: Container,
        policy: CombinePolicy,
    ) -> EngineResult<()> {
        let uid = overlay.uid();
        let existing = self
            .cache
            .peek(&uid_key(uid))
            .ok_or_else(|| EngineError::container_missing(uid))?;
        let base = existing
            .try_read_for(self.lock_timeout)
            .ok_or_else(|| EngineError::container_lock(uid))?
            .clone();
        let domain_key = base.get_string(DOMAIN_KEY_ATTRIBUTE).ok_or_else(|| {
            EngineError::new(EngineErrorCode::MissingAttribute, "container has no domain")
                .with_details(format!("uid: {}", uid))
        })?;

        let mut merged = combine(&base, &overlay, policy).map_err(|e| {
            EngineError::new(EngineErrorCode::FailedToCombine, "failed to combine containers")
                .with_details(format!("uid: {}, policy: {}", uid, policy.as_str()))
                .with_source(e)
        })?;
        strip_relevancy(&mut merged, &overlay);
        merged.set_string(DOMAIN_KEY_ATTRIBUTE, &domain_key)?;
        self.apply_put_locked(state, merged)
    }

    /// Reject a container whose user-key values another container in the
    /// domain already holds
    pub(crate) fn check_user_keys(
        &self,
        state: &EngineState,
        domain: &SearchIndex,
        container: &Container,
    ) -> EngineResult<()> {
        let text = self.text();
        for (definition, value) in indexed_attributes(container, &state.registry) {
            if definition.index_type != IndexType::UserKey {
                continue;
            }
            let raw = value.as_string();
            let holders =
                domain.user_key_conflicts(definition, &text, &raw, container.uid())?;
            if let Some(holder) = holders.first() {
                return Err(EngineError::new(
                    EngineErrorCode::DuplicateUserKey,
                    "user key already belongs to another container",
                )
                .with_details(format!(
                    "index: {}, value: {}, holder: {}",
                    definition.key, raw, holder
                )));
            }
        }
        Ok(())
    }

    /// Uid of the container holding a user-key value in any domain
    pub(crate) fn resolve_user_key(
        &self,
        state: &EngineState,
        attribute_key: &str,
        value: &str,
    ) -> EngineResult<u32> {
        let definition = state
            .registry
            .get(attribute_key)
            .ok_or_else(|| EngineError::index_missing(attribute_key))?;
        if definition.index_type != IndexType::UserKey {
            return Err(EngineError::new(
                EngineErrorCode::IndexTypeNotUserKey,
                "index is not a user key",
            )
            .with_details(format!("index: {}", definition.key)));
        }
        let text = self.text();
        for domain in state.domains() {
            let holders = domain.search_exact(definition, &text, value)?;
            if let Some(uid) = holders.first() {
                return Ok(*uid);
            }
        }
        Err(EngineError::new(EngineErrorCode::InvalidUid, "no container holds the user key")
            .with_details(format!("index: {}, value: {}", definition.key, value)))
    }
}
