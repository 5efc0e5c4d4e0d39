//! Background worker
//!
//! One thread per engine. Each turn it writes the state snapshot and the
//! container snapshot once their intervals have elapsed, sweeps the cache,
//! then waits for a batch of queued mutations. After shutdown is requested
//! it keeps applying entries until the queue is empty, then exits.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::observability::{log_event, log_event_with_fields, Event, Logger};

use super::handle::EngineInner;

/// Most entries applied per batch
const MAX_BATCH: usize = 1024;

/// Interval between cache sweeps while under the ceilings
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

pub(crate) fn run(inner: Arc<EngineInner>) {
    log_event(Event::WorkerStart);

    let mut last_sweep = Instant::now();
    let mut last_state_write = Instant::now();
    let mut last_data_write = Instant::now();

    loop {
        if !inner.is_running() {
            // Shutdown: apply what is already queued, then stop.
            while let Some(first) = inner.queue.try_recv() {
                apply_batch(&inner, first);
            }
            if inner.queue.is_empty() {
                break;
            }
            continue;
        }

        let (state_interval, data_interval) = {
            let settings = inner.settings.lock();
            (
                settings.config.state_write_interval(),
                settings.config.container_write_interval(),
            )
        };
        if last_state_write.elapsed() >= state_interval {
            if let Err(err) = inner.write_state_file() {
                inner.metrics.increment_persistence_failures();
                log_event_with_fields(
                    Event::StateWriteFailed,
                    &[("error", err.to_string().as_str())],
                );
            }
            last_state_write = Instant::now();
        }
        if last_data_write.elapsed() >= data_interval {
            if let Err(err) = inner.write_container_file() {
                inner.metrics.increment_persistence_failures();
                log_event_with_fields(
                    Event::DataWriteFailed,
                    &[("error", err.to_string().as_str())],
                );
            }
            last_data_write = Instant::now();
        }

        let status = inner.cache.status();
        let over_ceiling = status.items > status.max_items || status.memory > status.max_memory;
        if over_ceiling || last_sweep.elapsed() >= SWEEP_INTERVAL {
            let evicted = inner.cache.sweep();
            if evicted > 0 {
                inner.metrics.add_evictions(evicted as u64);
                Logger::trace(
                    Event::CacheSweep.as_str(),
                    &[("evicted", evicted.to_string().as_str())],
                );
            }
            last_sweep = Instant::now();
        }

        if let Some(first) = inner.queue.recv_timeout(inner.idle_wait) {
            apply_batch(&inner, first);
        }
    }

    log_event(Event::WorkerStop);
}

/// Apply `first` plus whatever else is already queued, up to `MAX_BATCH`
fn apply_batch(inner: &EngineInner, first: super::queue::QueueEntry) {
    let mut batch = Vec::with_capacity(16);
    batch.push(first);
    while batch.len() < MAX_BATCH {
        match inner.queue.try_recv() {
            Some(entry) => batch.push(entry),
            None => break,
        }
    }

    let count = batch.len();
    for entry in batch {
        let kind = entry.kind();
        if let Err(err) = inner.apply_entry(entry) {
            inner.metrics.increment_queue_failures();
            log_event_with_fields(
                Event::QueueEntryFailed,
                &[("entry", kind), ("error", err.to_string().as_str())],
            );
        }
    }
    inner.queue.complete(count);
    inner.metrics.increment_queue_batches();
    Logger::trace(
        Event::QueueBatch.as_str(),
        &[("entries", count.to_string().as_str())],
    );
}
