// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL event write-ahead log.
//!
//! Events are durably appended before the daemon's in-memory
//! [`crate::state::MaterializedState`] is updated, so a crash between
//! "committed" and "replied to the worker" always recovers by replay.
//! Each entry is a single line of JSON: `{"seq":N,"event":{...}}\n`.

use qb_core::Event;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Maximum buffered entries before a forced flush (group-commit
/// batching).
const FLUSH_THRESHOLD: usize = 100;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt WAL entry at offset {offset}: {message}")]
    Corrupt { offset: u64, message: String },
}

#[derive(Serialize)]
struct WalRecordRef<'a> {
    seq: u64,
    event: &'a Event,
}

#[derive(Deserialize)]
struct WalRecord {
    seq: u64,
    event: Event,
}

/// A single WAL entry with its assigned sequence number.
#[derive(Debug, Clone)]
pub struct WalEntry {
    pub seq: u64,
    pub event: Event,
}

/// Append-only JSONL WAL. Buffers writes and flushes either when the
/// buffer crosses [`FLUSH_THRESHOLD`] or [`Wal::flush`] is called
/// explicitly; the daemon calls `flush` after each batch commit so no
/// acknowledged step result is ever unrecoverable.
pub struct Wal {
    file: File,
    read_file: File,
    path: PathBuf,
    write_seq: u64,
    write_buffer: Vec<Vec<u8>>,
    read_offset: u64,
}

impl Wal {
    /// Open or create a WAL at `path`. `processed_seq` is the last
    /// sequence already folded into a snapshot (0 if there is none); scans
    /// forward from there to compute `write_seq` and `read_offset`.
    pub fn open(path: &Path, processed_seq: u64) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let read_file = OpenOptions::new().read(true).open(path)?;

        let mut wal = Wal {
            file,
            read_file,
            path: path.to_path_buf(),
            write_seq: processed_seq,
            write_buffer: Vec::new(),
            read_offset: 0,
        };
        wal.scan_to_end()?;
        Ok(wal)
    }

    fn scan_to_end(&mut self) -> Result<(), WalError> {
        let mut reader = BufReader::new(OpenOptions::new().read(true).open(&self.path)?);
        let mut offset = 0u64;
        let mut line = String::new();
        loop {
            line.clear();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                break;
            }
            let trimmed = line.trim_end_matches('\n');
            if trimmed.is_empty() {
                offset += n as u64;
                continue;
            }
            match serde_json::from_str::<WalRecord>(trimmed) {
                Ok(record) => {
                    self.write_seq = self.write_seq.max(record.seq);
                }
                Err(e) => {
                    warn!(offset, error = %e, "skipping corrupt WAL entry during scan");
                }
            }
            offset += n as u64;
        }
        self.read_offset = offset;
        Ok(())
    }

    /// Append an event, assigning it the next sequence number. Buffered;
    /// call [`Wal::flush`] (or cross [`FLUSH_THRESHOLD`]) to make it
    /// durable.
    pub fn append(&mut self, event: Event) -> Result<u64, WalError> {
        self.write_seq += 1;
        let seq = self.write_seq;
        let record = WalRecordRef { seq, event: &event };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        self.write_buffer.push(line);
        if self.write_buffer.len() >= FLUSH_THRESHOLD {
            self.flush()?;
        }
        Ok(seq)
    }

    /// Force all buffered entries to disk, fsync included.
    pub fn flush(&mut self) -> Result<(), WalError> {
        if self.write_buffer.is_empty() {
            return Ok(());
        }
        for line in self.write_buffer.drain(..) {
            self.file.write_all(&line)?;
        }
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    /// Read every entry from the beginning, skipping corrupt lines with a
    /// warning rather than failing the whole replay.
    pub fn replay_all(path: &Path) -> Result<Vec<WalEntry>, WalError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = OpenOptions::new().read(true).open(path)?;
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();
        let mut offset = 0u64;
        let mut line = String::new();
        loop {
            line.clear();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                break;
            }
            let trimmed = line.trim_end_matches('\n');
            if !trimmed.is_empty() {
                match serde_json::from_str::<WalRecord>(trimmed) {
                    Ok(record) => entries.push(WalEntry {
                        seq: record.seq,
                        event: record.event,
                    }),
                    Err(e) => {
                        warn!(offset, error = %e, "skipping corrupt WAL entry during replay");
                    }
                }
            }
            offset += n as u64;
        }
        Ok(entries)
    }

    /// Read entries with `seq > since`, in order, without rewinding past
    /// entries already consumed by a prior call — used by the daemon's
    /// dispatch loop to pick up events appended by concurrent readers in
    /// the same process (suspension points).
    pub fn next_unprocessed(&mut self, since: u64) -> Result<Vec<WalEntry>, WalError> {
        self.read_file.seek(SeekFrom::Start(self.read_offset))?;
        let mut reader = BufReader::new(&self.read_file);
        let mut entries = Vec::new();
        let mut consumed = 0u64;
        let mut line = String::new();
        loop {
            line.clear();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                break;
            }
            consumed += n as u64;
            let trimmed = line.trim_end_matches('\n');
            if trimmed.is_empty() {
                continue;
            }
            let record: WalRecord = serde_json::from_str(trimmed)?;
            if record.seq > since {
                entries.push(WalEntry {
                    seq: record.seq,
                    event: record.event,
                });
            }
        }
        self.read_offset += consumed;
        Ok(entries)
    }

    /// Truncate the WAL file to empty, used after a checkpoint folds every
    /// entry into a fresh snapshot (step 2 `--fresh`, and periodic
    /// compaction).
    pub fn truncate(&mut self) -> Result<(), WalError> {
        self.write_buffer.clear();
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.read_offset = 0;
        Ok(())
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
