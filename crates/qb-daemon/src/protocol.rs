// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control endpoint wire protocol: newline-terminated JSON over
//! a loopback TCP connection. One request per line, one response per line
//! — no length prefix, unlike the worker subprocess protocol, since
//! the control endpoint is meant to be legible with `nc`/`curl` during
//! manual debugging.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// `{ "v": 1, "id": <string>, "method": <string>, "params": {...} }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlRequest {
    pub v: u32,
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl ControlRequest {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: serde_json::Value) -> Self {
        ControlRequest { v: 1, id: id.into(), method: method.into(), params }
    }
}

/// `{ "v": 1, "id": <string>, "ok": <bool>, "result": {...}?, "error": {...}? }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResponse {
    pub v: u32,
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ControlErrorBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlErrorBody {
    pub code: String,
    pub message: String,
}

impl ControlResponse {
    pub fn ok(id: impl Into<String>, result: serde_json::Value) -> Self {
        ControlResponse { v: 1, id: id.into(), ok: true, result: Some(result), error: None }
    }

    pub fn err(id: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        ControlResponse {
            v: 1,
            id: id.into(),
            ok: false,
            result: None,
            error: Some(ControlErrorBody { code: code.into(), message: message.into() }),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("connection closed")]
    ConnectionClosed,
}

/// Read one request line. `Ok(None)` means the peer closed the connection
/// cleanly (EOF before any bytes of a new line).
pub async fn read_request(reader: &mut BufReader<OwnedReadHalf>) -> Result<Option<ControlRequest>, ProtocolError> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::ConnectionClosed);
    }
    Ok(Some(serde_json::from_str(trimmed)?))
}

pub async fn write_response(writer: &mut OwnedWriteHalf, response: &ControlResponse) -> Result<(), ProtocolError> {
    let mut bytes = serde_json::to_vec(response)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
