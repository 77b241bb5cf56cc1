// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control endpoint: a loopback TCP listener that spawns one task per
//! accepted connection, framing each request and response as a single
//! line of newline-terminated JSON.

use std::sync::Arc;

use qb_queue::ResetFilter;
use serde_json::json;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::protocol::{read_request, write_response, ControlRequest, ControlResponse};
use crate::scheduler::Scheduler;

/// Bind and serve the control endpoint until the scheduler's shutdown
/// signal tears down the listener task (the caller aborts this task on
/// shutdown rather than this function returning on its own).
pub async fn serve(scheduler: Arc<Scheduler>) -> std::io::Result<()> {
    let addr = scheduler.config.control_addr();
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "control endpoint listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &scheduler).await {
                debug!(%peer, error = %e, "control connection ended with an error");
            }
        });
    }
}

async fn handle_connection(stream: tokio::net::TcpStream, scheduler: &Scheduler) -> Result<(), crate::protocol::ProtocolError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    while let Some(request) = read_request(&mut reader).await? {
        let response = dispatch(scheduler, request).await;
        write_response(&mut write_half, &response).await?;
    }
    Ok(())
}

async fn dispatch(scheduler: &Scheduler, request: ControlRequest) -> ControlResponse {
    let id = request.id.clone();
    match request.method.as_str() {
        "ping" => ControlResponse::ok(id, json!({ "pong": true })),

        "status" => {
            let counts = scheduler.queue_counts();
            let run = scheduler.store.state().build_runs.get(&scheduler.run_id).cloned();
            ControlResponse::ok(
                id,
                json!({
                    "run_id": scheduler.run_id.as_str(),
                    "queue": {
                        "pending": counts.pending,
                        "processing": counts.processing,
                        "done": counts.done,
                        "error": counts.error,
                    },
                    "run": run,
                }),
            )
        }

        "enqueue_scan" => {
            let roots: Vec<qb_core::model::PlaysetRoot> = match serde_json::from_value(
                request.params.get("roots").cloned().unwrap_or(serde_json::Value::Null),
            ) {
                Ok(roots) => roots,
                Err(e) => return ControlResponse::err(id, "bad_params", format!("`roots`: {e}")),
            };
            match scheduler.enqueue_scan(&roots).await {
                Ok(stats) => ControlResponse::ok(
                    id,
                    json!({
                        "files_seen": stats.files_seen,
                        "routed": stats.routed,
                        "skipped": stats.skipped,
                        "enqueued": stats.enqueued,
                        "deduplicated": stats.deduplicated_queue,
                        "read_errors": stats.read_errors,
                    }),
                ),
                Err(e) => ControlResponse::err(id, "scan_failed", e.to_string()),
            }
        }

        "reset" => {
            let filter: ResetFilter = match request.params.get("filter") {
                Some(value) if !value.is_null() => match serde_json::from_value(value.clone()) {
                    Ok(f) => f,
                    Err(e) => return ControlResponse::err(id, "bad_params", format!("`filter`: {e}")),
                },
                _ => ResetFilter::default(),
            };
            match scheduler.reset(&filter) {
                Ok(count) => ControlResponse::ok(id, json!({ "reset_count": count })),
                Err(e) => ControlResponse::err(id, "reset_failed", e.to_string()),
            }
        }

        "shutdown" => {
            let graceful = request.params.get("graceful").and_then(|v| v.as_bool()).unwrap_or(true);
            scheduler.request_shutdown(graceful);
            ControlResponse::ok(id, json!({ "accepted": true, "graceful": graceful }))
        }

        other => {
            warn!(method = other, "unknown control method");
            ControlResponse::err(id, "unknown_method", format!("no such method: {other}"))
        }
    }
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
