// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker pool: daemon-side process spawn, framed IPC, crash
//! isolation, and recycling over long-lived `qb-workerd` subprocesses.
//!
//! This avoids the transitive-import collapse a naive per-file subprocess
//! would hit: a worker subprocess loads only `qb-script` and
//! `qb-ast-serde` (never the index or logging stack), is spawned once at
//! daemon startup rather than per file, and is recycled, not respawned
//! per request, to bound resident memory.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod config;
mod error;
mod handle;
mod pool;

pub use config::WorkerPoolConfig;
pub use error::WorkerError;
pub use handle::WorkerHandle;
pub use pool::{ExecOutcome, WorkerPool};

pub use qb_ast_serde::protocol::{Op, Request, Response};
