// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-level failures ("index corruption, control endpoint
//! unbindable, worker pool cannot be sustained abort the run"). Per-file
//! step failures never surface here — they are recorded against the
//! queue item and the run's counters instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("no state directory could be determined (HOME is unset)")]
    NoStateDir,
    #[error(transparent)]
    Store(#[from] qb_storage::StoreError),
    #[error(transparent)]
    Queue(#[from] qb_queue::QueueError),
    #[error(transparent)]
    ContentStore(#[from] qb_content_store::ContentStoreError),
    #[error(transparent)]
    Router(#[from] qb_router::RouterError),
    #[error(transparent)]
    Worker(#[from] qb_worker::WorkerError),
    #[error(transparent)]
    RunLog(#[from] crate::runlog::RunLogError),
    #[error("failed to bind control endpoint on {addr}: {source}")]
    ControlBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DaemonError {
    /// Process exit code: 0 success (not representable here), 1
    /// fatal, 2 control endpoint unbindable, 3 index locked.
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::ControlBind { .. } => 2,
            DaemonError::Store(qb_storage::StoreError::Lock(_)) => 3,
            _ => 1,
        }
    }
}
