// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker subprocess binary: reads one JSON [`Request`]
//! per line from stdin, writes one JSON [`Response`] per line to stdout,
//! and touches nothing else in the workspace — no storage, no index, no
//! logging stack. A crash or a wedge here costs one subprocess, never the
//! daemon.
//!
//! Framing is newline-delimited JSON, not the length-prefixed scheme used
//! elsewhere in this tree: each line is a complete, independent request or
//! response, which keeps this binary readable with `cat` during manual
//! debugging and keeps the protocol crate (`qb-ast-serde`) free of a
//! framing layer of its own.

mod version;

use std::io::{self, BufRead, Write};

use base64::prelude::{Engine as _, BASE64_STANDARD};
use qb_ast_serde::protocol::{Op, Request, Response};
use qb_ast_serde::{count_ast_nodes, deserialize_ast, serialize_ast};
use qb_script::ast::RootNode;

fn main() {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();
    let mut locked = stdin.lock();

    loop {
        line.clear();
        let read = match locked.read_line(&mut line) {
            Ok(n) => n,
            Err(e) => {
                eprintln!("qb-workerd: stdin read error: {e}");
                std::process::exit(1);
            }
        };
        if read == 0 {
            // daemon closed its end; nothing left to serve.
            break;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(trimmed) {
            Ok(request) => handle(request),
            Err(e) => Response::err(0, "malformed_request", e.to_string()),
        };

        if write_response(&mut stdout, &response).is_err() {
            // daemon hung up on stdout; no point continuing.
            break;
        }
    }
}

fn write_response(out: &mut impl Write, response: &Response) -> io::Result<()> {
    let mut bytes = serde_json::to_vec(response).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    bytes.push(b'\n');
    out.write_all(&bytes)?;
    out.flush()
}

fn handle(request: Request) -> Response {
    match request.op {
        Op::Ping => {
            // First request of a cold-started worker's life; touch the
            // lazy version probe here so its cost lands during the
            // cold-start budget rather than on a later parse.
            let _ = version::parser_version();
            Response::ok(request.id)
        }
        Op::ParseFile => handle_parse_file(request),
        Op::ParseText => handle_parse_text(request),
        Op::SerializeAst => handle_serialize_ast(request),
    }
}

fn handle_parse_file(request: Request) -> Response {
    let Some(path) = request.path.as_deref() else {
        return Response::err(request.id, "missing_field", "parse_file requires `path`");
    };
    let recovering = request.recovering.unwrap_or(true);

    let (root, diagnostics) = if recovering {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => return Response::err(request.id, "io_read", e.to_string()),
        };
        qb_script::parse_text_recovering(path, &source)
    } else {
        match qb_script::parse_file(std::path::Path::new(path)) {
            Ok(parsed) => parsed,
            Err(e) => return Response::err(request.id, "io_read", e.to_string()),
        }
    };

    respond_with_ast(request.id, &root, diagnostics)
}

fn handle_parse_text(request: Request) -> Response {
    let Some(text) = request.text.as_deref() else {
        return Response::err(request.id, "missing_field", "parse_text requires `text`");
    };
    // `path` here is a caller-supplied label only (content-store hash,
    // typically) and is never read from disk: parse_text never touches
    // the filesystem, which is the whole point of routing real daemon
    // traffic through this op instead of parse_file — no host-absolute
    // path crosses into the wire protocol or anything it feeds.
    let filename = request.path.as_deref().unwrap_or("<text>");
    let (root, diagnostics) = qb_script::parse_text_recovering(filename, text);
    respond_with_ast(request.id, &root, diagnostics)
}

/// Re-derive the canonical wire form and node count for an AST the
/// daemon already holds as JSON (e.g. a cached tree read back out of the
/// content store) without re-parsing its source. The daemon process does
/// link `qb-script`/`qb-ast-serde` itself (it walks ASTs for SYMBOLS/REFS),
/// but this op exists so that re-deriving a wire form never requires the
/// daemon to reimplement `count_ast_nodes`/canonical serialization — it
/// stays this binary's job, same as every other op here.
fn handle_serialize_ast(request: Request) -> Response {
    let Some(text) = request.text.as_deref() else {
        return Response::err(request.id, "missing_field", "serialize_ast requires `text`");
    };
    let root: RootNode = match deserialize_ast(text.as_bytes()) {
        Ok(root) => root,
        Err(e) => return Response::err(request.id, "invalid_ast", e.to_string()),
    };
    respond_with_ast(request.id, &root, Vec::new())
}

fn respond_with_ast(id: u64, root: &RootNode, diagnostics: Vec<qb_script::Diagnostic>) -> Response {
    let bytes = match serialize_ast(root) {
        Ok(b) => b,
        Err(e) => return Response::err(id, "serialize_failed", e.to_string()),
    };
    let node_count = count_ast_nodes(root);
    Response {
        id,
        ok: true,
        ast: Some(BASE64_STANDARD.encode(bytes)),
        node_count: Some(node_count as u64),
        diagnostics,
        error: None,
    }
}
