// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single long-lived `qb-workerd` subprocess and the line-framed JSON
//! protocol used to talk to it over its stdin/stdout.

use std::process::Stdio;
use std::time::Duration;

use qb_ast_serde::protocol::{Op, Request, Response};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::time::timeout;

use crate::config::WorkerPoolConfig;
use crate::error::WorkerError;

/// A single line may not exceed this many bytes ("strict max
/// length"). ASTs for CK3 script files are small; this is a defense
/// against a wedged or malicious worker, not a realistic ceiling.
const MAX_LINE_BYTES: usize = 64 * 1024 * 1024;

/// One spawned `qb-workerd` process plus its framed stdin/stdout pipes.
pub struct WorkerHandle {
    pub id: usize,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_request_id: u64,
    /// Successful parses since the last recycle (memory hygiene).
    completed: u32,
}

impl WorkerHandle {
    /// Spawn a worker and block until its cold-start `ping` succeeds or
    /// the cold-start budget expires (startup invariant).
    pub async fn spawn(id: usize, config: &WorkerPoolConfig) -> Result<Self, WorkerError> {
        let mut child = tokio::process::Command::new(&config.binary_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| WorkerError::Spawn {
                path: config.binary_path.display().to_string(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(WorkerError::Crashed)?;
        let stdout = BufReader::new(child.stdout.take().ok_or(WorkerError::Crashed)?);

        let mut handle = WorkerHandle {
            id,
            child,
            stdin,
            stdout,
            next_request_id: 1,
            completed: 0,
        };

        let ping = Request {
            id: handle.next_id(),
            op: Op::Ping,
            path: None,
            text: None,
            recovering: None,
        };
        match timeout(config.cold_start_budget, handle.roundtrip(&ping)).await {
            Ok(Ok(resp)) if resp.ok => Ok(handle),
            Ok(Ok(_)) => Err(WorkerError::Protocol("ping response was not ok".into())),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(WorkerError::ColdStartTimeout(config.cold_start_budget)),
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    pub fn build_request(&mut self, op: Op, path: Option<String>, text: Option<String>, recovering: Option<bool>) -> Request {
        Request { id: self.next_id(), op, path, text, recovering }
    }

    /// Send `request` and wait for its matching response, bounded by
    /// `timeout_duration` (per-request timeout).
    pub async fn execute(&mut self, request: &Request, timeout_duration: Duration) -> Result<Response, WorkerError> {
        let response = timeout(timeout_duration, self.roundtrip(request))
            .await
            .map_err(|_| WorkerError::Timeout(timeout_duration))??;
        if response.id != request.id {
            return Err(WorkerError::Protocol(format!(
                "response id {} did not match request id {}",
                response.id, request.id
            )));
        }
        if response.ok {
            self.completed += 1;
        }
        Ok(response)
    }

    async fn roundtrip(&mut self, request: &Request) -> Result<Response, WorkerError> {
        let mut line = serde_json::to_vec(request).map_err(|e| WorkerError::Protocol(e.to_string()))?;
        line.push(b'\n');
        self.stdin.write_all(&line).await?;
        self.stdin.flush().await?;

        let mut buf = String::new();
        let read = self.stdout.read_line(&mut buf).await?;
        if read == 0 {
            return Err(WorkerError::Crashed);
        }
        if buf.len() > MAX_LINE_BYTES {
            return Err(WorkerError::Protocol("response line exceeded max length".into()));
        }
        serde_json::from_str(buf.trim_end()).map_err(|e| WorkerError::Protocol(e.to_string()))
    }

    /// Whether this worker has done enough work to warrant recycling
    /// (memory hygiene, default M=500).
    pub fn should_recycle(&self, recycle_after: u32) -> bool {
        self.completed >= recycle_after
    }

    /// Whether the child process is still alive, without blocking.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    pub async fn kill(mut self) {
        let _ = self.child.kill().await;
    }
}
