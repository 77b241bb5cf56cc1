// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-protocol client: one short-lived TCP connection per call over
//! the control endpoint's newline-JSON framing.

use std::net::SocketAddr;
use std::time::Duration;

use qb_daemon::protocol::{ControlRequest, ControlResponse};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("qbuilderd is not running on {0}")]
    DaemonNotRunning(SocketAddr),
    #[error("failed to start qbuilderd: {0}")]
    DaemonStartFailed(String),
    #[error("timed out waiting for qbuilderd to become ready on {0}")]
    DaemonStartTimeout(SocketAddr),
    #[error("qbuilderd rejected the request: {code}: {message}")]
    Rejected { code: String, message: String },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Poll interval while waiting for a freshly spawned daemon to start
/// accepting connections.
pub fn connect_poll_interval() -> Duration {
    std::env::var("QBUILDER_CONNECT_POLL_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(50))
}

/// How long to wait for a freshly spawned daemon to start accepting
/// connections before giving up.
pub fn connect_timeout() -> Duration {
    std::env::var("QBUILDER_CONNECT_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(10))
}

/// Issue one control-protocol call over a single-use connection and return
/// the decoded result payload, or a [`ClientError::Rejected`] if the daemon
/// reported an error.
pub async fn call(addr: SocketAddr, method: &str, params: serde_json::Value) -> Result<serde_json::Value, ClientError> {
    let stream = TcpStream::connect(addr).await.map_err(|_| ClientError::DaemonNotRunning(addr))?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let request = ControlRequest::new("1", method, params);
    let mut line = serde_json::to_vec(&request)?;
    line.push(b'\n');
    write_half.write_all(&line).await?;
    write_half.flush().await?;

    let mut response_line = String::new();
    reader.read_line(&mut response_line).await?;
    let response: ControlResponse = serde_json::from_str(response_line.trim())?;

    match (response.ok, response.result, response.error) {
        (true, Some(result), _) => Ok(result),
        (true, None, _) => Ok(serde_json::Value::Null),
        (false, _, Some(error)) => Err(ClientError::Rejected { code: error.code, message: error.message }),
        (false, _, None) => Err(ClientError::Rejected { code: "unknown".to_string(), message: "no error body".to_string() }),
    }
}

/// Poll `addr` until a connection succeeds or `timeout` elapses, used after
/// spawning `qbuilderd` to detect when the control endpoint is ready.
pub async fn wait_until_reachable(addr: SocketAddr, timeout: Duration) -> Result<(), ClientError> {
    let started = std::time::Instant::now();
    loop {
        if TcpStream::connect(addr).await.is_ok() {
            return Ok(());
        }
        if started.elapsed() >= timeout {
            return Err(ClientError::DaemonStartTimeout(addr));
        }
        tokio::time::sleep(connect_poll_interval()).await;
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
