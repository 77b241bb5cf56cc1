// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-run, per-step JSONL logging: one line per completed step,
//! distinct from the daemon's own `tracing` output. Consumers (CI,
//! dashboards) tail `logs/qbuilder_<date>.jsonl` rather than parse the
//! human-readable daemon log.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use qb_core::id::{FileId, QueueId, RunId};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunLogError {
    #[error("failed to open run log at {path}: {source}")]
    Open { path: String, source: std::io::Error },
    #[error("failed to write run log entry: {0}")]
    Write(#[from] std::io::Error),
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

/// One row of `logs/qbuilder_<date>.jsonl`.
#[derive(Debug, Clone, Serialize)]
pub struct StepLogEntry {
    pub ts: chrono::DateTime<Utc>,
    pub run_id: RunId,
    pub queue_id: QueueId,
    pub file_id: FileId,
    pub relative_path: String,
    pub step: String,
    pub outcome: &'static str,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A `Mutex<File>`-backed JSONL appender. One instance per daemon process,
/// shared across the dispatch loop's concurrent step tasks.
pub struct RunLog {
    file: Mutex<File>,
}

impl RunLog {
    /// Open (creating if absent) today's log file under `logs_dir`, named
    /// `qbuilder_<YYYY-MM-DD>.jsonl`.
    pub fn open(logs_dir: &Path) -> Result<Self, RunLogError> {
        std::fs::create_dir_all(logs_dir).map_err(|source| RunLogError::Open {
            path: logs_dir.display().to_string(),
            source,
        })?;
        let path = Self::path_for(logs_dir, Utc::now());
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| RunLogError::Open { path: path.display().to_string(), source })?;
        Ok(RunLog { file: Mutex::new(file) })
    }

    fn path_for(logs_dir: &Path, at: chrono::DateTime<Utc>) -> PathBuf {
        logs_dir.join(format!("qbuilder_{}.jsonl", at.format("%Y-%m-%d")))
    }

    pub fn record(&self, entry: &StepLogEntry) -> Result<(), RunLogError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        file.write_all(&line)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "runlog_tests.rs"]
mod tests;
