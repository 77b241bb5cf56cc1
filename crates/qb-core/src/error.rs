// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The error taxonomy: every failure a step can report is classified by
//! `kind`, and the kind alone determines whether the daemon retries or
//! terminates the item.

use serde::{Deserialize, Serialize};

/// The kinds of failure a step, the worker pool, or the index can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Router cannot classify a path. Terminal; item never enqueued.
    RouterUnmatched,
    /// File vanished or unreadable at ingest. Transient; retried, then
    /// terminal.
    IoRead,
    /// Lexer produced a diagnostic. Non-fatal; parsing continues.
    LexError,
    /// Parser produced a diagnostic. Non-fatal; partial AST persisted.
    ParseError,
    /// Symbol/ref/loc extractor raised on malformed AST. Terminal for that
    /// item.
    ExtractError,
    /// Worker exited or timed out. Respawn and retry up to K, then
    /// terminal.
    WorkerCrash,
    /// Index commit failed. Transient with backoff; aborts the daemon if
    /// persistent.
    DbWrite,
    /// Item's lease expired while processing. Silent; item is re-leased.
    LeaseExpired,
    /// Worker sent a malformed response. Kill worker; retry, terminal
    /// after K.
    Protocol,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RouterUnmatched => "router_unmatched",
            ErrorKind::IoRead => "io_read",
            ErrorKind::LexError => "lex_error",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::ExtractError => "extract_error",
            ErrorKind::WorkerCrash => "worker_crash",
            ErrorKind::DbWrite => "db_write",
            ErrorKind::LeaseExpired => "lease_expired",
            ErrorKind::Protocol => "protocol",
        }
    }

    /// Whether the item should be retried (subject to an attempt ceiling)
    /// rather than being classified terminal outright.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::IoRead | ErrorKind::WorkerCrash | ErrorKind::DbWrite | ErrorKind::Protocol
        )
    }

    /// Whether a non-fatal diagnostic of this kind still lets the step
    /// (and the steps after it) proceed.
    pub fn is_non_fatal(&self) -> bool {
        matches!(self, ErrorKind::LexError | ErrorKind::ParseError)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured failure reported by a step up to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct StepError {
    pub kind: ErrorKind,
    pub message: String,
    /// For `extract_error`, the AST node path where extraction failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_path: Option<String>,
}

impl StepError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            node_path: None,
        }
    }

    pub fn with_node_path(mut self, node_path: impl Into<String>) -> Self {
        self.node_path = Some(node_path.into());
        self
    }
}

/// A single recoverable diagnostic `(line, column, message)` as produced by
/// the lexer or parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
