// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Failures loading or evaluating the routing table.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("failed to read routing table at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse routing table: {0}")]
    Hcl(#[from] hcl::Error),

    #[error("routing table declares unknown envelope {name:?}; must be one of the canonical set")]
    UnknownEnvelope { name: String },

    #[error(
        "envelope {envelope:?} declares steps {declared:?}, but the canonical step list is \
         {canonical:?}"
    )]
    StepMismatch {
        envelope: String,
        declared: Vec<String>,
        canonical: Vec<String>,
    },

    #[error("route pattern {pattern:?} references envelope {envelope:?}, which is not declared")]
    UndeclaredEnvelope { pattern: String, envelope: String },

    #[error("invalid glob pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// Runtime failure (`router_unmatched`): a path matched no entry in
    /// the table at all. Terminal; the item is never enqueued.
    #[error("no routing table entry matches path {path:?}")]
    Unmatched { path: String },
}
