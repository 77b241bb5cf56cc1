// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persistence substrate tying the WAL, materialized state, snapshot,
//! and single-writer lock together.
//!
//! Only the daemon process holds a writable [`Store`]; other processes
//! (tools, IDEs) are expected to read the same storage root read-only, or
//! talk to the daemon over its control endpoint — this crate does
//! not enforce that by itself beyond [`BuildLock`] refusing a second
//! writer.

use crate::lock::{BuildLock, LockError};
use crate::snapshot::{Snapshot, SnapshotError};
use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use qb_core::Event;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// An open index + queue store: WAL, materialized state, periodic
/// snapshot, and the exclusive `build_lock`.
pub struct Store {
    wal: Mutex<Wal>,
    state: RwLock<MaterializedState>,
    snapshot_path: PathBuf,
    wal_path: PathBuf,
    _lock: BuildLock,
}

impl Store {
    /// Open (or create) a store rooted at `storage_root` (conventionally
    /// `~/.ck3raven/`). Acquires `build_lock`, loads the last
    /// snapshot if any, then replays WAL entries newer than the
    /// snapshot's `processed_seq` to reach current state.
    pub fn open(storage_root: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(storage_root).map_err(|source| WalError::Io(source))?;
        let lock = BuildLock::acquire(&storage_root.join("build_lock"))?;

        let snapshot_path = storage_root.join("snapshot.bin");
        let wal_path = storage_root.join("index.wal");

        let (processed_seq, mut state) = match Snapshot::load(&snapshot_path)? {
            Some(snapshot) => (snapshot.processed_seq, snapshot.state),
            None => (0, MaterializedState::default()),
        };

        let entries = Wal::replay_all(&wal_path)?;
        let mut max_seq = processed_seq;
        for entry in &entries {
            if entry.seq > processed_seq {
                state.apply_event(&entry.event);
            }
            max_seq = max_seq.max(entry.seq);
        }
        info!(
            replayed = entries.len(),
            processed_seq, max_seq, "opened index store"
        );

        let wal = Wal::open(&wal_path, max_seq)?;

        Ok(Store {
            wal: Mutex::new(wal),
            state: RwLock::new(state),
            snapshot_path,
            wal_path,
            _lock: lock,
        })
    }

    /// Opens a store for the `--fresh` startup path (step 2):
    /// truncates any existing WAL and snapshot before building empty
    /// state, while still enforcing the single-writer lock.
    pub fn open_fresh(storage_root: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(storage_root).map_err(|source| WalError::Io(source))?;
        let lock = BuildLock::acquire(&storage_root.join("build_lock"))?;
        let snapshot_path = storage_root.join("snapshot.bin");
        let wal_path = storage_root.join("index.wal");
        let _ = std::fs::remove_file(&snapshot_path);
        let _ = std::fs::remove_file(&wal_path);
        let wal = Wal::open(&wal_path, 0)?;
        Ok(Store {
            wal: Mutex::new(wal),
            state: RwLock::new(MaterializedState::default()),
            snapshot_path,
            wal_path,
            _lock: lock,
        })
    }

    /// Durably append `event` and fold it into materialized state. The
    /// single writer (the daemon's dispatch loop) calls this after every
    /// committed step result.
    pub fn apply(&self, event: Event) -> Result<u64, StoreError> {
        let seq = {
            let mut wal = self.wal.lock();
            let seq = wal.append(event.clone())?;
            wal.flush()?;
            seq
        };
        self.state.write().apply_event(&event);
        Ok(seq)
    }

    /// Apply a batch atomically with respect to durability: all events are
    /// appended and flushed together before any is folded into state.
    pub fn apply_batch(&self, events: Vec<Event>) -> Result<Vec<u64>, StoreError> {
        let mut seqs = Vec::with_capacity(events.len());
        {
            let mut wal = self.wal.lock();
            for event in &events {
                seqs.push(wal.append(event.clone())?);
            }
            wal.flush()?;
        }
        let mut state = self.state.write();
        for event in &events {
            state.apply_event(event);
        }
        Ok(seqs)
    }

    /// A read-only snapshot guard over current materialized state.
    pub fn state(&self) -> RwLockReadGuard<'_, MaterializedState> {
        self.state.read()
    }

    /// Fold the WAL into a fresh snapshot and truncate it. Safe to call
    /// at any time (readers still see a consistent `state` throughout);
    /// called periodically by the daemon and once more during graceful
    /// shutdown.
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        let mut wal = self.wal.lock();
        wal.flush()?;
        let seq = wal.write_seq();
        let state_copy = self.state.read().clone();
        Snapshot::write(&self.snapshot_path, seq, &state_copy)?;
        wal.truncate()?;
        Ok(())
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
