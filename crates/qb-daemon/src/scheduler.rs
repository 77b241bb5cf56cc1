// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The dispatch loop (lifecycle step 4, concurrency model): lease
//! a batch, run each item's pending step concurrently up to the worker
//! pool's concurrency, fold `BuildRunCounters`, and repeat until the queue
//! is empty. An empty queue parks on a poll interval rather than exiting,
//! since `enqueue_scan` can hand it new work without a restart.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use qb_content_store::ContentStore;
use qb_core::id::{QueueId, RunId};
use qb_core::model::{BuildRunCounters, BuildRunStatus, PlaysetRoot};
use qb_core::Event;
use qb_extract::ExtractionConfig;
use qb_queue::{Queue, ResetFilter};
use qb_router::RoutingTable;
use qb_storage::{QueueCounts, Store};
use qb_worker::WorkerPool;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::Config;
use crate::dispatch::run_step;
use crate::discovery::{self, DiscoveryStats};
use crate::error::DaemonError;
use crate::runlog::RunLog;

/// Why the dispatch loop stopped running steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Graceful shutdown requested and the queue had drained.
    Drained,
    /// Abort shutdown requested; the loop stopped without draining.
    Aborted,
}

/// Everything the control endpoint and the dispatch loop share: the
/// durable store, the collaborators built from it, and shutdown signaling.
/// One `Scheduler` exists per daemon process (single writer).
pub struct Scheduler {
    pub store: Arc<Store>,
    pub queue: Arc<Queue>,
    pub content_store: Arc<ContentStore>,
    pub router: Arc<RoutingTable>,
    pub worker_pool: Arc<WorkerPool>,
    pub config: Config,
    pub run_id: RunId,
    pub run_log: RunLog,
    extraction_config: ExtractionConfig,
    wake: Notify,
    shutdown_requested: AtomicBool,
    abort: AtomicBool,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        queue: Arc<Queue>,
        content_store: Arc<ContentStore>,
        router: Arc<RoutingTable>,
        worker_pool: Arc<WorkerPool>,
        config: Config,
        run_id: RunId,
        run_log: RunLog,
    ) -> Self {
        Scheduler {
            store,
            queue,
            content_store,
            router,
            worker_pool,
            config,
            run_id,
            run_log,
            extraction_config: ExtractionConfig::default_ck3(),
            wake: Notify::new(),
            shutdown_requested: AtomicBool::new(false),
            abort: AtomicBool::new(false),
        }
    }

    pub fn queue_counts(&self) -> QueueCounts {
        self.queue.counts()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Request shutdown (`shutdown` method): `graceful = true` lets
    /// the loop drain the queue (up to `Config::drain_deadline`, enforced
    /// by the caller) before exiting; `graceful = false` stops it after
    /// the in-flight batch without waiting for the queue to empty.
    pub fn request_shutdown(&self, graceful: bool) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        self.abort.store(!graceful, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    pub async fn enqueue_scan(&self, roots: &[PlaysetRoot]) -> Result<DiscoveryStats, DaemonError> {
        let stats = discovery::scan_playset(&self.content_store, &self.router, &self.queue, roots)?;
        self.wake.notify_one();
        Ok(stats)
    }

    pub fn reset(&self, filter: &ResetFilter) -> Result<usize, DaemonError> {
        Ok(self.queue.reset(filter)?)
    }

    /// Run the dispatch loop until shutdown is requested and (for a
    /// graceful request) the queue has drained, or an abort fires.
    pub async fn run(self: &Arc<Self>) -> Result<StopReason, DaemonError> {
        let poll_interval = Duration::from_millis(250);

        loop {
            if self.abort.load(Ordering::SeqCst) {
                return Ok(StopReason::Aborted);
            }

            let leased = self.queue.lease(self.config.lease_batch_size, self.config.lease_duration, "qbuilderd")?;

            if leased.is_empty() {
                if self.shutdown_requested.load(Ordering::SeqCst) {
                    return Ok(StopReason::Drained);
                }
                tokio::select! {
                    _ = self.wake.notified() => continue,
                    _ = tokio::time::sleep(poll_interval) => continue,
                }
            }

            let mut join_set: JoinSet<Result<(QueueId, crate::dispatch::StepOutcome), DaemonError>> = JoinSet::new();
            for item in leased {
                let scheduler = Arc::clone(self);
                join_set.spawn(async move {
                    let queue_id = item.queue_id;
                    let file_id = item.file_id;
                    let relative_path = item.relative_path.clone();
                    let mut current = item;
                    let mut crashes_recovered = 0u32;

                    // Drive every pending step for this item while its lease
                    // is held, rather than returning to the lease queue after
                    // one step: a non-final item's lease only refreshes to
                    // `lease_duration` out, so leasing it once per step would
                    // stall a multi-step envelope by a full lease interval
                    // per step.
                    loop {
                        let step_name = current.pending_step().map(|s| s.name()).unwrap_or_else(|| "NONE".to_string());
                        let started = std::time::Instant::now();
                        let result = run_step(
                            &scheduler.store,
                            &scheduler.queue,
                            &scheduler.content_store,
                            &scheduler.worker_pool,
                            &scheduler.extraction_config,
                            scheduler.config.lease_duration,
                            scheduler.config.max_io_retries,
                            scheduler.config.max_crash_retries,
                            &current,
                        )
                        .await;
                        let duration_ms = started.elapsed().as_millis() as u64;
                        let refreshed = scheduler.queue.item(queue_id);
                        let error = match &refreshed {
                            Some(r) if r.status == qb_core::model::QueueItemStatus::Error => r.error_message.clone(),
                            _ => None,
                        };
                        let entry = crate::runlog::StepLogEntry {
                            ts: chrono::Utc::now(),
                            run_id: scheduler.run_id.clone(),
                            queue_id,
                            file_id,
                            relative_path: relative_path.clone(),
                            step: step_name,
                            outcome: if error.is_some() { "error" } else { "ok" },
                            duration_ms,
                            error,
                        };
                        if let Err(e) = scheduler.run_log.record(&entry) {
                            warn!(error = %e, "failed to write step log entry");
                        }
                        let outcome = result?;
                        crashes_recovered += outcome.crashes_recovered;

                        match refreshed {
                            Some(r) if !r.is_terminal() => current = r,
                            _ => break,
                        }
                    }

                    Ok((queue_id, crate::dispatch::StepOutcome { crashes_recovered }))
                });
            }

            let mut crashes_this_batch = 0u64;
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok(Ok((queue_id, outcome))) => {
                        crashes_this_batch += u64::from(outcome.crashes_recovered);
                        if outcome.crashes_recovered > 0 {
                            self.store.apply(Event::WorkerCrashRecorded {
                                run_id: self.run_id.clone(),
                                queue_id,
                                at: chrono::Utc::now(),
                            })?;
                        }
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "step task returned a hard error; dispatch loop aborting");
                        return Err(e);
                    }
                    Err(join_err) => {
                        warn!(error = %join_err, "step task panicked");
                    }
                }
            }

            self.update_counters(crashes_this_batch)?;
        }
    }

    fn update_counters(&self, crashes_this_batch: u64) -> Result<(), DaemonError> {
        let counts = self.queue.counts();
        let prior_crashes = self
            .store
            .state()
            .build_runs
            .get(&self.run_id)
            .map(|r| r.counters.worker_crashes)
            .unwrap_or(0);
        let counters = BuildRunCounters {
            files_discovered: counts.pending + counts.processing + counts.done + counts.error,
            items_done: counts.done,
            items_error: counts.error,
            worker_crashes: prior_crashes + crashes_this_batch,
        };
        self.store.apply(Event::BuildRunCountersUpdated { run_id: self.run_id.clone(), counters })?;
        Ok(())
    }

    /// Close out the current run as `completed` or `aborted` and force a
    /// final checkpoint so the next startup replays as little WAL as
    /// possible.
    pub fn complete_run(&self, status: BuildRunStatus) -> Result<(), DaemonError> {
        self.store.apply(Event::BuildRunCompleted {
            run_id: self.run_id.clone(),
            completed_at: chrono::Utc::now(),
            status,
        })?;
        self.store.checkpoint()?;
        info!(run_id = %self.run_id, %status, "build run closed");
        Ok(())
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
