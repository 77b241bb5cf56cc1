// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup configuration: storage root, control endpoint, worker
//! pool sizing, lease durations, timeouts, and the routing table path.
//! Loaded from environment variables with defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::DaemonError;

/// Resolve the storage root: `QBUILDER_STATE_DIR` > `XDG_STATE_HOME`/ck3raven
/// > `~/.ck3raven`.
fn state_dir() -> Result<PathBuf, DaemonError> {
    if let Ok(dir) = std::env::var("QBUILDER_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("ck3raven"));
    }
    let home = std::env::var("HOME").map_err(|_| DaemonError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".ck3raven"))
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Daemon-wide configuration, resolved once at startup (lifecycle
/// step 1).
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (conventionally `~/.ck3raven/`).
    pub storage_root: PathBuf,
    /// Path to the HCL routing table.
    pub routing_table_path: PathBuf,
    /// Path to a JSON-encoded `Vec<PlaysetRoot>` consulted for the initial
    /// discovery pass at startup (lifecycle step 3). Later playset
    /// changes arrive via the `enqueue_scan` control method instead, so a
    /// missing file here just means "nothing to scan yet" rather than a
    /// startup failure.
    pub playset_path: PathBuf,
    /// Path to the `qb-workerd` binary to spawn.
    pub workerd_path: PathBuf,
    /// Directory containing `qbuilder_<date>.jsonl` step logs.
    pub logs_dir: PathBuf,
    /// Daemon log file (the process's own tracing output, distinct from
    /// the per-step JSONL run log).
    pub daemon_log_path: PathBuf,
    /// Loopback TCP port for the control protocol (default 19876).
    pub control_port: u16,
    /// N: worker pool size (default: physical core count).
    pub worker_pool_size: usize,
    /// Batch size per `lease()` call (dispatch loop).
    pub lease_batch_size: usize,
    /// Lease duration granted per item.
    pub lease_duration: chrono::Duration,
    /// Soft per-request worker deadline (default 10s).
    pub request_timeout: Duration,
    /// Cold-start budget (default 1s).
    pub cold_start_budget: Duration,
    /// M: recycle a worker after this many parses (default 500).
    pub recycle_after: u32,
    /// K: worker-crash retries before an item is terminal (default 2).
    pub max_crash_retries: u32,
    /// R: `io_read` retries before an item is terminal (default 3).
    pub max_io_retries: u32,
    /// Graceful shutdown's maximum wait for in-flight items (default 30s).
    pub drain_deadline: Duration,
}

impl Config {
    /// Load configuration from the environment, falling back to the
    /// documented defaults.
    pub fn load() -> Result<Self, DaemonError> {
        let storage_root = state_dir()?;
        let worker_pool_size = env_usize("QBUILDER_WORKER_POOL_SIZE")
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4));

        Ok(Config {
            routing_table_path: std::env::var("QBUILDER_ROUTING_TABLE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| storage_root.join("routing.hcl")),
            playset_path: std::env::var("QBUILDER_PLAYSET_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| storage_root.join("playset.json")),
            workerd_path: std::env::var("QBUILDER_WORKERD_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_workerd_path()),
            logs_dir: storage_root.join("logs"),
            daemon_log_path: storage_root.join("daemon.log"),
            control_port: env_u64("QBUILDER_CONTROL_PORT").unwrap_or(19876) as u16,
            worker_pool_size: worker_pool_size.max(1),
            lease_batch_size: env_usize("QBUILDER_LEASE_BATCH_SIZE").unwrap_or(16),
            lease_duration: chrono::Duration::seconds(env_u64("QBUILDER_LEASE_SECS").unwrap_or(60) as i64),
            request_timeout: Duration::from_secs(env_u64("QBUILDER_REQUEST_TIMEOUT_SECS").unwrap_or(10)),
            cold_start_budget: Duration::from_millis(env_u64("QBUILDER_COLD_START_BUDGET_MS").unwrap_or(1_000)),
            recycle_after: env_u64("QBUILDER_RECYCLE_AFTER").unwrap_or(500) as u32,
            max_crash_retries: env_u64("QBUILDER_MAX_CRASH_RETRIES").unwrap_or(2) as u32,
            max_io_retries: env_u64("QBUILDER_MAX_IO_RETRIES").unwrap_or(3) as u32,
            drain_deadline: Duration::from_secs(env_u64("QBUILDER_DRAIN_DEADLINE_SECS").unwrap_or(30)),
            storage_root,
        })
    }

    pub fn control_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([127, 0, 0, 1], self.control_port))
    }

    pub fn worker_pool_config(&self) -> qb_worker::WorkerPoolConfig {
        let mut cfg = qb_worker::WorkerPoolConfig::new(self.workerd_path.clone(), self.worker_pool_size);
        cfg.request_timeout = self.request_timeout;
        cfg.cold_start_budget = self.cold_start_budget;
        cfg.recycle_after = self.recycle_after;
        cfg.max_crash_retries = self.max_crash_retries;
        cfg
    }
}

/// `qb-workerd` is expected alongside the daemon binary unless overridden
/// — the common case for a `cargo build --workspace` layout.
fn default_workerd_path() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    exe_dir.join(if cfg!(windows) { "qb-workerd.exe" } else { "qb-workerd" })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
