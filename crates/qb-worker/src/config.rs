// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker pool tuning. Defaults mirror the documented numbers; callers
//! override from [`qb_daemon`]'s `Config::load`.

use std::path::PathBuf;
use std::time::Duration;

/// Tuning for a [`crate::WorkerPool`].
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Path to the `qb-workerd` binary to spawn N times.
    pub binary_path: PathBuf,
    /// N: defaults to the number of physical cores.
    pub pool_size: usize,
    /// Soft per-request deadline (default 10s).
    pub request_timeout: Duration,
    /// Cold-start budget: spawn to first `ping` response (default 1s).
    pub cold_start_budget: Duration,
    /// M: recycle a worker after this many successful parses (default 500).
    pub recycle_after: u32,
    /// K: retry an in-flight item up to this many times across worker
    /// crashes before it is marked terminal (default 2).
    pub max_crash_retries: u32,
}

impl WorkerPoolConfig {
    pub fn new(binary_path: PathBuf, pool_size: usize) -> Self {
        WorkerPoolConfig {
            binary_path,
            pool_size: pool_size.max(1),
            request_timeout: Duration::from_secs(10),
            cold_start_budget: Duration::from_secs(1),
            recycle_after: 500,
            max_crash_retries: 2,
        }
    }
}
