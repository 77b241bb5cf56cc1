// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure modes the worker pool can report up to the daemon as
//! `worker_crash` / `protocol` errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn worker binary at {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("worker pipe error: {0}")]
    Io(#[from] std::io::Error),
    #[error("worker sent a malformed response: {0}")]
    Protocol(String),
    #[error("worker did not respond within {0:?}")]
    Timeout(std::time::Duration),
    #[error("worker exited or its pipe closed")]
    Crashed,
    #[error("worker failed its cold-start ping within {0:?}")]
    ColdStartTimeout(std::time::Duration),
    #[error("item failed after {attempts} worker crash retries")]
    RetriesExhausted { attempts: u32 },
}
