//! Container snapshots
//!
//! Layout: `[magic u32 LE]`, then records of
//! `[crc32 u32 LE][length u32 LE][serialized container]`, then the magic
//! again. Records are independent: a damaged one is skipped and the rest of
//! the file is still read. A truncated tail ends the file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::checksum::{compute_checksum, verify_checksum};
use crate::container::{deserialize, serialize};
use crate::observability::{log_event_with_fields, Event, Logger};

use super::handle::{EngineInner, SearchEngine};
use super::errors::{EngineError, EngineErrorCode, EngineResult};
use super::queue::QueueEntry;
use super::state_file::{prepare_directory, rotate};

/// File magic, written at both ends
pub const CONTAINER_FILE_MAGIC: u32 = 53_468_721;

const RECORD_HEADER_LEN: usize = 8;

pub(crate) fn container_file_path(dir: &Path, generation: u8) -> PathBuf {
    dir.join(format!("searchd.{:02}.containers", generation))
}

/// Outcome of reading a container snapshot
#[derive(Debug, Default)]
struct ReadOutcome {
    containers: Vec<crate::container::Container>,
    corrupt: usize,
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn parse_snapshot(data: &[u8]) -> EngineResult<ReadOutcome> {
    if read_u32(data, 0) != Some(CONTAINER_FILE_MAGIC) {
        return Err(EngineError::new(EngineErrorCode::DataRead, "bad container snapshot magic"));
    }

    let mut outcome = ReadOutcome::default();
    let mut offset = 4;
    loop {
        let remaining = data.len() - offset;
        if remaining == 4 && read_u32(data, offset) == Some(CONTAINER_FILE_MAGIC) {
            break;
        }
        let (Some(crc), Some(length)) = (read_u32(data, offset), read_u32(data, offset + 4)) else {
            break;
        };
        let start = offset + RECORD_HEADER_LEN;
        let Some(payload) = data.get(start..start + length as usize) else {
            break;
        };
        offset = start + length as usize;

        if !verify_checksum(payload, crc) {
            outcome.corrupt += 1;
            continue;
        }
        match deserialize(payload) {
            Ok(container) => outcome.containers.push(container),
            Err(_) => outcome.corrupt += 1,
        }
    }
    Ok(outcome)
}

fn write_record(writer: &mut impl Write, payload: &[u8]) -> std::io::Result<()> {
    writer.write_all(&compute_checksum(payload).to_le_bytes())?;
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(payload)
}

impl EngineInner {
    /// Write every cached container to `searchd.00.containers`
    pub(crate) fn write_container_file(&self) -> EngineResult<PathBuf> {
        let dir = self.settings.lock().config.container_path.clone();
        prepare_directory(&dir)?;

        let data_write = |e: std::io::Error| {
            EngineError::io(EngineErrorCode::DataWrite, "failed to write container snapshot", e)
                .with_details(dir.display().to_string())
        };
        rotate(|generation| container_file_path(&dir, generation)).map_err(data_write)?;
        let path = container_file_path(&dir, 0);
        let file = File::create(&path).map_err(data_write)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&CONTAINER_FILE_MAGIC.to_le_bytes()).map_err(data_write)?;
        let mut written = 0usize;
        for stored in self.cache.values() {
            let Some(container) = stored.try_read_for(self.lock_timeout) else {
                Logger::warn(
                    Event::DataWriteFailed.as_str(),
                    &[("uid", stored.uid().to_string().as_str()), ("reason", "locked")],
                );
                continue;
            };
            let payload = serialize(&container);
            drop(container);

            write_record(&mut writer, &payload).map_err(data_write)?;
            written += 1;
        }
        writer.write_all(&CONTAINER_FILE_MAGIC.to_le_bytes()).map_err(data_write)?;
        let file = writer.into_inner().map_err(|e| data_write(e.into_error()))?;
        file.sync_all().map_err(data_write)?;

        self.metrics.increment_data_writes();
        log_event_with_fields(
            Event::DataWriteComplete,
            &[
                ("path", path.display().to_string().as_str()),
                ("containers", written.to_string().as_str()),
            ],
        );
        Ok(path)
    }
}

impl SearchEngine {
    /// Write a container snapshot now; returns the file written
    pub fn write_data(&self) -> EngineResult<PathBuf> {
        self.inner.write_container_file()
    }

    /// Queue every readable container of a snapshot as a deferred put.
    ///
    /// `None` reads `searchd.00.containers` under the configured container
    /// path. Returns how many containers were queued; call `sync` to wait
    /// for them. Damaged records are skipped, then reported as a
    /// `DataRead` error once the good ones are queued.
    pub fn restore_data(&self, path: Option<&Path>) -> EngineResult<usize> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => container_file_path(&self.inner.settings.lock().config.container_path, 0),
        };
        let data = fs::read(&path).map_err(|e| {
            EngineError::io(EngineErrorCode::DataRead, "failed to read container snapshot", e)
                .with_details(path.display().to_string())
        })?;
        let outcome = parse_snapshot(&data)
            .map_err(|e| e.with_details(path.display().to_string()))?;

        let highest = outcome.containers.iter().map(|c| c.uid()).max().unwrap_or(0);
        self.inner.settings.lock().observe_uid(highest);

        let mut queued = 0usize;
        for container in outcome.containers {
            self.inner.enqueue(QueueEntry::Put(container))?;
            queued += 1;
        }

        if outcome.corrupt > 0 {
            log_event_with_fields(
                Event::DataCorruption,
                &[
                    ("path", path.display().to_string().as_str()),
                    ("records", outcome.corrupt.to_string().as_str()),
                ],
            );
            return Err(EngineError::new(
                EngineErrorCode::DataRead,
                "container snapshot has damaged records",
            )
            .with_details(format!("damaged: {}, restored: {}", outcome.corrupt, queued)));
        }

        log_event_with_fields(
            Event::DataRestoreComplete,
            &[
                ("path", path.display().to_string().as_str()),
                ("containers", queued.to_string().as_str()),
            ],
        );
        Ok(queued)
    }
}
