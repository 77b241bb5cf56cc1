// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persistent worker pool: N long-lived `qb-workerd` processes,
//! a ready queue of idle workers, crash isolation with respawn, and
//! per-worker recycling after M successful parses.
//!
//! The daemon is the only caller; it performs all index writes itself on
//! receipt of a worker's response (Dispatch) — this crate never
//! touches the index.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use qb_ast_serde::protocol::{Op, Response};
use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};

use crate::config::WorkerPoolConfig;
use crate::error::WorkerError;
use crate::handle::WorkerHandle;

/// Outcome of [`WorkerPool::execute`]: the worker's response, plus how
/// many crash-and-respawn cycles it took to get there (for
/// `BuildRunCounters::worker_crashes`).
#[derive(Debug)]
pub struct ExecOutcome {
    pub response: Response,
    pub crashes_recovered: u32,
}

/// A live pool of `qb-workerd` subprocesses.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    idle: Mutex<VecDeque<WorkerHandle>>,
    /// Bounds concurrent in-flight requests to `pool_size`.
    permits: Semaphore,
    next_worker_id: AtomicUsize,
}

impl WorkerPool {
    /// Spawn `config.pool_size` workers, each passing its cold-start ping
    /// check (startup invariant). Aborts (returns `Err`) if a worker
    /// cannot come up — the caller maps this to daemon startup failure.
    pub async fn start(config: WorkerPoolConfig) -> Result<Arc<Self>, WorkerError> {
        let mut idle = VecDeque::with_capacity(config.pool_size);
        for i in 0..config.pool_size {
            let handle = WorkerHandle::spawn(i, &config).await.map_err(|e| {
                warn!(worker_id = i, pool_size = config.pool_size, error = %e, "worker failed cold start");
                e
            })?;
            idle.push_back(handle);
        }
        info!(pool_size = config.pool_size, "worker pool started");
        let pool_size = config.pool_size;
        Ok(Arc::new(WorkerPool {
            config,
            idle: Mutex::new(idle),
            permits: Semaphore::new(pool_size),
            next_worker_id: AtomicUsize::new(pool_size),
        }))
    }

    /// Execute one request against the pool: acquire an idle worker (or
    /// respawn one if every idle worker is busy and none remain), run the
    /// request, retry on crash up to `max_crash_retries`, and return the
    /// worker to the idle queue (recycling it first if it has done enough
    /// work).
    pub async fn execute(
        &self,
        op: Op,
        path: Option<String>,
        text: Option<String>,
        recovering: Option<bool>,
    ) -> Result<ExecOutcome, WorkerError> {
        let _permit = self.permits.acquire().await.map_err(|_| WorkerError::Crashed)?;
        let mut crashes_recovered = 0;

        loop {
            let mut handle = self.take_or_spawn().await?;
            let request = handle.build_request(op, path.clone(), text.clone(), recovering);

            match handle.execute(&request, self.config.request_timeout).await {
                Ok(response) => {
                    self.recycle_or_return(handle).await;
                    return Ok(ExecOutcome { response, crashes_recovered });
                }
                Err(WorkerError::Crashed) | Err(WorkerError::Timeout(_)) | Err(WorkerError::Protocol(_)) => {
                    handle.kill().await;
                    crashes_recovered += 1;
                    if crashes_recovered > self.config.max_crash_retries {
                        return Err(WorkerError::RetriesExhausted {
                            attempts: crashes_recovered,
                        });
                    }
                    warn!(attempt = crashes_recovered, "worker crashed mid-request, respawning and retrying");
                    continue;
                }
                Err(other) => return Err(other),
            }
        }
    }

    async fn take_or_spawn(&self) -> Result<WorkerHandle, WorkerError> {
        let taken = { self.idle.lock().await.pop_front() };
        match taken {
            Some(mut handle) if handle.is_alive() => Ok(handle),
            Some(handle) => {
                handle.kill().await;
                self.spawn_replacement().await
            }
            None => self.spawn_replacement().await,
        }
    }

    async fn spawn_replacement(&self) -> Result<WorkerHandle, WorkerError> {
        let id = self.next_worker_id.fetch_add(1, Ordering::SeqCst);
        WorkerHandle::spawn(id, &self.config).await
    }

    async fn recycle_or_return(&self, handle: WorkerHandle) {
        if handle.should_recycle(self.config.recycle_after) {
            info!(worker_id = handle.id, "recycling worker after reaching parse budget");
            handle.kill().await;
            match self.spawn_replacement().await {
                Ok(fresh) => self.idle.lock().await.push_back(fresh),
                Err(e) => warn!(error = %e, "failed to respawn recycled worker; pool shrinks by one"),
            }
        } else {
            self.idle.lock().await.push_back(handle);
        }
    }

    /// Current number of idle (not leased out) workers.
    pub async fn idle_count(&self) -> usize {
        self.idle.lock().await.len()
    }

    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    /// Shut down every idle worker. In-flight requests (if any are still
    /// holding a permit) finish or time out on their own; this does not
    /// forcibly cancel them (graceful shutdown).
    pub async fn shutdown(&self) {
        let mut idle = self.idle.lock().await;
        while let Some(handle) = idle.pop_front() {
            handle.kill().await;
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
