//! Shared, lockable container storage
//!
//! The cache and at most one queue entry hold the same `StoredContainer`
//! through `Arc`. Readers check a container out with a `ContainerGuard`,
//! which pins it so eviction skips it until the guard drops.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::cache::CacheValue;

use super::record::Container;

/// A container with its own lock and pin count
pub struct StoredContainer {
    uid: u32,
    body: RwLock<Container>,
    pins: AtomicUsize,
    created: Instant,
}

impl StoredContainer {
    pub fn new(container: Container) -> Self {
        Self {
            uid: container.uid(),
            body: RwLock::new(container),
            pins: AtomicUsize::new(0),
            created: Instant::now(),
        }
    }

    /// Uid captured at construction; stored containers always have one
    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Container> {
        self.body.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Container> {
        self.body.write()
    }

    pub fn try_read_for(&self, timeout: Duration) -> Option<RwLockReadGuard<'_, Container>> {
        self.body.try_read_for(timeout)
    }

    pub fn try_write_for(&self, timeout: Duration) -> Option<RwLockWriteGuard<'_, Container>> {
        self.body.try_write_for(timeout)
    }

    /// Clone of the current contents
    pub fn snapshot(&self) -> Container {
        self.body.read().clone()
    }

    pub fn created(&self) -> Instant {
        self.created
    }

    pub fn pin_count(&self) -> usize {
        self.pins.load(Ordering::Acquire)
    }

    /// Check the container out; eviction skips it while the guard lives
    pub fn pin(self: &Arc<Self>) -> ContainerGuard {
        self.pins.fetch_add(1, Ordering::AcqRel);
        ContainerGuard {
            inner: Arc::clone(self),
        }
    }
}

impl CacheValue for StoredContainer {
    fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }
}

impl fmt::Debug for StoredContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredContainer")
            .field("uid", &self.uid)
            .field("pins", &self.pin_count())
            .finish()
    }
}

/// A checked-out container. Dropping it unpins.
pub struct ContainerGuard {
    inner: Arc<StoredContainer>,
}

impl ContainerGuard {
    pub fn uid(&self) -> u32 {
        self.inner.uid()
    }

    /// Lock the container for reading
    pub fn read(&self) -> RwLockReadGuard<'_, Container> {
        self.inner.read()
    }

    /// Clone of the current contents
    pub fn to_container(&self) -> Container {
        self.inner.snapshot()
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        self.inner.pins.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for ContainerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerGuard")
            .field("uid", &self.uid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_and_unpin() {
        let stored = Arc::new(StoredContainer::new(Container::with_uid(4, "doc")));
        assert!(!stored.is_pinned());

        let first = stored.pin();
        let second = stored.pin();
        assert_eq!(stored.pin_count(), 2);
        assert_eq!(first.uid(), 4);

        drop(first);
        assert!(stored.is_pinned());
        drop(second);
        assert!(!stored.is_pinned());
    }

    #[test]
    fn test_guard_reads_current_contents() {
        let stored = Arc::new(StoredContainer::new(Container::with_uid(1, "doc")));
        let guard = stored.pin();
        stored.write().put_string("title", "hello").unwrap();
        assert_eq!(guard.read().get_string("title").as_deref(), Some("hello"));
        assert_eq!(guard.to_container().len(), 1);
    }

    #[test]
    fn test_try_write_times_out_while_read_locked() {
        let stored = StoredContainer::new(Container::with_uid(1, "doc"));
        let _read = stored.read();
        assert!(stored.try_write_for(Duration::from_millis(5)).is_none());
    }
}
