// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic materialized-state snapshots.
//!
//! A snapshot lets startup skip replaying the WAL from the beginning of
//! time: load the snapshot, then replay only the entries whose `seq`
//! exceeds the snapshot's `processed_seq`. Snapshots are zstd-compressed
//! JSON, written atomically (temp file + rename) so a crash mid-write
//! never corrupts the previous snapshot.

use crate::state::MaterializedState;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("compression error: {0}")]
    Zstd(std::io::Error),
}

#[derive(Serialize, Deserialize)]
struct SnapshotEnvelope {
    processed_seq: u64,
    state: MaterializedState,
}

/// A point-in-time capture of [`MaterializedState`] plus the WAL sequence
/// number it reflects.
pub struct Snapshot {
    pub processed_seq: u64,
    pub state: MaterializedState,
}

impl Snapshot {
    /// Write the snapshot atomically to `path`.
    pub fn write(path: &Path, processed_seq: u64, state: &MaterializedState) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let envelope = SnapshotEnvelope {
            processed_seq,
            state: state.clone(),
        };
        let json = serde_json::to_vec(&envelope)?;
        let compressed = zstd::encode_all(json.as_slice(), 0).map_err(SnapshotError::Zstd)?;

        let tmp_path = path.with_extension("tmp");
        let mut tmp = std::fs::File::create(&tmp_path)?;
        tmp.write_all(&compressed)?;
        tmp.sync_all()?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Load a snapshot from `path`, if one exists. `rebuild_indices` is
    /// called on the loaded state before it is returned, so callers never
    /// need to remember to do it themselves.
    pub fn load(path: &Path) -> Result<Option<Snapshot>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }
        let mut compressed = Vec::new();
        std::fs::File::open(path)?.read_to_end(&mut compressed)?;
        let json = zstd::decode_all(compressed.as_slice()).map_err(SnapshotError::Zstd)?;
        let mut envelope: SnapshotEnvelope = serde_json::from_slice(&json)?;
        envelope.state.rebuild_indices();
        Ok(Some(Snapshot {
            processed_seq: envelope.processed_seq,
            state: envelope.state,
        }))
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
