// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure serialization of [`qb_script::ast::RootNode`] trees.
//!
//! This crate is the only thing, besides the lexer and parser themselves,
//! that the worker subprocess binary loads. It has no dependency on any
//! storage, index, or logging code in the workspace — deliberately, since an
//! earlier revision of the worker pool pulled those in transitively through
//! a shared "core" crate and turned a sub-millisecond parse into a 10-30x
//! regression from cold-start index loading on every spawn. Keep it that way.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

use qb_script::ast::RootNode;
use thiserror::Error;

pub mod protocol;

pub use protocol::{Op, Request, Response, ResponseError};
pub use qb_script::ast::{self, count_ast_nodes};

/// Errors produced while serializing or deserializing an AST.
#[derive(Debug, Error)]
pub enum AstSerdeError {
    #[error("failed to serialize AST: {0}")]
    Serialize(serde_json::Error),
    #[error("failed to deserialize AST: {0}")]
    Deserialize(serde_json::Error),
}

/// Serialize a parsed tree to its on-wire form: compact JSON (no
/// insignificant whitespace), UTF-8, with field order fixed by the struct
/// declaration order in [`qb_script::ast`]. Two calls on an equal tree
/// always produce identical bytes.
pub fn serialize_ast(root: &RootNode) -> Result<Vec<u8>, AstSerdeError> {
    serde_json::to_vec(root).map_err(AstSerdeError::Serialize)
}

/// Inverse of [`serialize_ast`]. `deserialize_ast(serialize_ast(x)) == x`
/// for every tree `x`.
pub fn deserialize_ast(bytes: &[u8]) -> Result<RootNode, AstSerdeError> {
    serde_json::from_slice(bytes).map_err(AstSerdeError::Deserialize)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
