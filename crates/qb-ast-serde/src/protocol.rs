// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types for the worker subprocess protocol: one JSON object
//! per line over stdin/stdout. Lives here, not in `qb-worker`, so the
//! worker binary can speak the protocol without depending on anything
//! beyond this crate and `qb-script`.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::{Deserialize, Serialize};

/// `daemon -> worker`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub op: Op,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovering: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    ParseFile,
    ParseText,
    SerializeAst,
    Ping,
}

/// `worker -> daemon`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ast: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<qb_script::Diagnostic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Response {
    pub fn ok(id: u64) -> Self {
        Response {
            id,
            ok: true,
            ast: None,
            node_count: None,
            diagnostics: Vec::new(),
            error: None,
        }
    }

    pub fn err(id: u64, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Response {
            id,
            ok: false,
            ast: None,
            node_count: None,
            diagnostics: Vec::new(),
            error: Some(ResponseError { kind: kind.into(), message: message.into() }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
    pub kind: String,
    pub message: String,
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
