// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `qbuilderd` — the build daemon binary (lifecycle).
//!
//! Thin startup/shutdown shell: everything past config load and
//! `Scheduler` construction lives in [`qb_daemon`].

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

use std::sync::Arc;

use qb_content_store::ContentStore;
use qb_core::{BuildRunStatus, Event, IdGen, PlaysetRoot, RunId, UuidIdGen};
use qb_daemon::{Config, DaemonError, RunLog, Scheduler, StopReason};
use qb_queue::Queue;
use qb_router::RoutingTable;
use qb_storage::Store;
use qb_worker::WorkerPool;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("qbuilderd {}", env!("CARGO_PKG_VERSION"));
                return;
            }
            "--help" | "-h" => {
                print_help();
                return;
            }
            "--fresh" => {}
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("Usage: qbuilderd [--fresh | --help | --version]");
                std::process::exit(1);
            }
        }
    }
    let fresh = std::env::args().any(|a| a == "--fresh");

    match run(fresh).await {
        Ok(()) => {}
        Err(e) => {
            error!(error = %e, "daemon exiting with error");
            std::process::exit(e.exit_code());
        }
    }
}

fn print_help() {
    println!("qbuilderd {}", env!("CARGO_PKG_VERSION"));
    println!("The QBuilder build daemon — owns the index for one storage root.");
    println!();
    println!("USAGE:");
    println!("    qbuilderd [--fresh]");
    println!();
    println!("The daemon is normally started by the `qbuilder` CLI and should not");
    println!("be invoked directly. It listens on a loopback TCP port for the");
    println!("control protocol (ping/status/enqueue_scan/reset/shutdown).");
    println!();
    println!("OPTIONS:");
    println!("    --fresh          Truncate the existing index before starting");
    println!("    -h, --help       Print help information");
    println!("    -V, --version    Print version information");
}

async fn run(fresh: bool) -> Result<(), DaemonError> {
    let config = Config::load()?;
    let log_guard = setup_logging(&config)?;
    info!(storage_root = %config.storage_root.display(), fresh, "starting qbuilderd");

    let store = match open_store(&config, fresh) {
        Ok(store) => Arc::new(store),
        Err(DaemonError::Store(qb_storage::StoreError::Lock(e))) => {
            eprintln!("qbuilderd is already running against {}", config.storage_root.display());
            eprintln!("  {e}");
            std::process::exit(3);
        }
        Err(e) => return Err(e),
    };

    let router = Arc::new(RoutingTable::load(&config.routing_table_path)?);
    let queue = Arc::new(Queue::with_system_clock(Arc::clone(&store)));
    let content_store = Arc::new(ContentStore::new(Arc::clone(&store), &config.storage_root));
    let run_log = RunLog::open(&config.logs_dir)?;

    let worker_pool = WorkerPool::start(config.worker_pool_config()).await?;
    info!(pool_size = worker_pool.pool_size(), "worker pool ready");

    let run_id = RunId::new(UuidIdGen.next());
    store.apply(Event::BuildRunStarted {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        trigger: if fresh { "fresh_start".to_string() } else { "start".to_string() },
        config_snapshot: serde_json::json!({
            "worker_pool_size": config.worker_pool_size,
            "lease_batch_size": config.lease_batch_size,
        }),
    })?;

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&store),
        Arc::clone(&queue),
        Arc::clone(&content_store),
        Arc::clone(&router),
        Arc::clone(&worker_pool),
        config.clone(),
        run_id,
        run_log,
    ));

    if let Some(roots) = load_initial_playset(&config) {
        match scheduler.enqueue_scan(&roots).await {
            Ok(stats) => info!(
                files_seen = stats.files_seen,
                enqueued = stats.enqueued,
                "initial discovery pass complete"
            ),
            Err(e) => warn!(error = %e, "initial discovery pass failed; continuing with an empty queue"),
        }
    } else {
        info!("no playset file found at startup; waiting for enqueue_scan");
    }

    let control_task = tokio::spawn(qb_daemon::control::serve(Arc::clone(&scheduler)));

    let mut sigterm = signal(SignalKind::terminate()).map_err(DaemonError::Io)?;
    let mut sigint = signal(SignalKind::interrupt()).map_err(DaemonError::Io)?;

    println!("READY");
    info!(control_port = config.control_port, "daemon ready");

    let dispatch_scheduler = Arc::clone(&scheduler);
    let dispatch_task = tokio::spawn(async move { dispatch_scheduler.run().await });

    let stop_reason = tokio::select! {
        result = dispatch_task => {
            result.unwrap_or_else(|e| {
                error!(error = %e, "dispatch loop task panicked");
                Ok(StopReason::Aborted)
            })?
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, requesting graceful shutdown");
            scheduler.request_shutdown(true);
            wait_for_drain(&scheduler, config.drain_deadline).await
        }
        _ = sigint.recv() => {
            info!("received SIGINT, requesting graceful shutdown");
            scheduler.request_shutdown(true);
            wait_for_drain(&scheduler, config.drain_deadline).await
        }
    };

    control_task.abort();
    worker_pool.shutdown().await;

    let final_status = match stop_reason {
        StopReason::Drained => BuildRunStatus::Completed,
        StopReason::Aborted => BuildRunStatus::Aborted,
    };
    scheduler.complete_run(final_status)?;

    info!("daemon stopped");
    drop(log_guard);
    Ok(())
}

/// Re-run the dispatch loop until it drains or the deadline elapses, used
/// only on the signal-driven shutdown path (the control `shutdown` method
/// sets the scheduler's flags; the original dispatch task observes them on
/// its own next iteration and returns, so this just re-awaits it under a
/// timeout as a backstop if the signal raced the task's own loop).
async fn wait_for_drain(scheduler: &Arc<Scheduler>, drain_deadline: std::time::Duration) -> StopReason {
    match tokio::time::timeout(drain_deadline, scheduler.run()).await {
        Ok(Ok(reason)) => reason,
        Ok(Err(e)) => {
            error!(error = %e, "dispatch loop errored while draining");
            StopReason::Aborted
        }
        Err(_) => {
            warn!("drain deadline elapsed; aborting with items still in flight");
            StopReason::Aborted
        }
    }
}

fn open_store(config: &Config, fresh: bool) -> Result<Store, DaemonError> {
    if fresh {
        Ok(Store::open_fresh(&config.storage_root)?)
    } else {
        Ok(Store::open(&config.storage_root)?)
    }
}

/// Load the startup discovery roots from `Config::playset_path`, if the
/// file exists (lifecycle step 3). A missing file is not an error —
/// the playset may not be configured yet, in which case discovery waits
/// for the first `enqueue_scan` control call.
fn load_initial_playset(config: &Config) -> Option<Vec<PlaysetRoot>> {
    let text = std::fs::read_to_string(&config.playset_path).ok()?;
    match serde_json::from_str(&text) {
        Ok(roots) => Some(roots),
        Err(e) => {
            warn!(path = %config.playset_path.display(), error = %e, "playset file is malformed, ignoring it");
            None
        }
    }
}

fn setup_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard, DaemonError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.daemon_log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        config.daemon_log_path.parent().ok_or(DaemonError::NoStateDir)?,
        config.daemon_log_path.file_name().ok_or(DaemonError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
