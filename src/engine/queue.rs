//! Deferred mutation queue
//!
//! A bounded FIFO between callers and the worker thread. Every accepted
//! entry is counted as pending until the worker reports it applied, which
//! is what `sync` waits on.
//!
//! # Invariants
//!
//! - Entries are applied in submission order
//! - The pending count never drops below zero
//! - A Free entry may be dropped when the queue is full; its container is
//!   released when the last `Arc` goes

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};

use crate::container::{CombinePolicy, Container, StoredContainer};

use super::errors::{EngineError, EngineErrorCode, EngineResult};

/// One deferred mutation
#[derive(Debug)]
pub enum QueueEntry {
    /// Release a container that left the cache
    Free(Arc<StoredContainer>),
    /// Cache and index a container
    Put(Container),
    /// Combine onto the cached version, then re-put
    Update(Container, CombinePolicy),
}

impl QueueEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            QueueEntry::Free(_) => "free",
            QueueEntry::Put(_) => "put",
            QueueEntry::Update(..) => "update",
        }
    }
}

#[derive(Debug)]
pub struct MutationQueue {
    sender: Sender<QueueEntry>,
    receiver: Receiver<QueueEntry>,
    pending: Mutex<usize>,
    drained: Condvar,
}

impl MutationQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            pending: Mutex::new(0),
            drained: Condvar::new(),
        }
    }

    /// Submit an entry, waiting up to `timeout` for room
    pub fn enqueue(&self, entry: QueueEntry, timeout: Duration) -> EngineResult<()> {
        *self.pending.lock() += 1;
        match self.sender.send_timeout(entry, timeout) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.complete(1);
                let kind = match err {
                    SendTimeoutError::Timeout(e) | SendTimeoutError::Disconnected(e) => e.kind(),
                };
                Err(EngineError::new(EngineErrorCode::FailedToPut, "mutation queue is full")
                    .with_details(format!("entry: {}", kind)))
            }
        }
    }

    /// Submit a Free entry without blocking
    pub fn enqueue_free(&self, stored: Arc<StoredContainer>) {
        *self.pending.lock() += 1;
        if let Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) =
            self.sender.try_send(QueueEntry::Free(stored))
        {
            self.complete(1);
        }
    }

    /// Next entry, waiting at most `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<QueueEntry> {
        match self.receiver.recv_timeout(timeout) {
            Ok(entry) => Some(entry),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_recv(&self) -> Option<QueueEntry> {
        self.receiver.try_recv().ok()
    }

    /// Mark `count` entries applied
    pub fn complete(&self, count: usize) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(count);
        if *pending == 0 {
            self.drained.notify_all();
        }
    }

    /// Wait until every accepted entry has been applied
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();
        while *pending > 0 {
            if self.drained.wait_until(&mut pending, deadline).timed_out() {
                return *pending == 0;
            }
        }
        true
    }

    pub fn pending(&self) -> usize {
        *self.pending.lock()
    }

    /// Entries waiting in the channel
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn container(uid: u32) -> Container {
        Container::with_uid(uid, "doc")
    }

    #[test]
    fn test_fifo_order_and_pending() {
        let queue = MutationQueue::new(8);
        for uid in 1..=3 {
            queue
                .enqueue(QueueEntry::Put(container(uid)), Duration::from_millis(10))
                .unwrap();
        }
        assert_eq!(queue.pending(), 3);
        assert_eq!(queue.len(), 3);

        for expected in 1..=3 {
            match queue.try_recv() {
                Some(QueueEntry::Put(c)) => assert_eq!(c.uid(), expected),
                other => panic!("unexpected entry: {:?}", other),
            }
        }
        queue.complete(3);
        assert_eq!(queue.pending(), 0);
        assert!(queue.wait_idle(Duration::from_millis(1)));
    }

    #[test]
    fn test_full_queue_rejects_and_restores_pending() {
        let queue = MutationQueue::new(1);
        queue
            .enqueue(QueueEntry::Put(container(1)), Duration::from_millis(1))
            .unwrap();
        let err = queue
            .enqueue(QueueEntry::Put(container(2)), Duration::from_millis(5))
            .unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::FailedToPut);
        assert_eq!(queue.pending(), 1);

        queue.enqueue_free(Arc::new(StoredContainer::new(container(3))));
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn test_wait_idle_wakes_on_completion() {
        let queue = Arc::new(MutationQueue::new(4));
        queue
            .enqueue(QueueEntry::Put(container(1)), Duration::from_millis(1))
            .unwrap();
        assert!(!queue.wait_idle(Duration::from_millis(5)));

        let worker = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let entry = queue.recv_timeout(Duration::from_secs(1));
                assert!(entry.is_some());
                queue.complete(1);
            })
        };
        assert!(queue.wait_idle(Duration::from_secs(5)));
        worker.join().unwrap();
    }
}
