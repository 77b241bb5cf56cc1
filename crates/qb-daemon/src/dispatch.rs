// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-step execution: run a leased [`QueueItem`]'s pending [`Step`] once,
//! fold whatever it produces into the index, then advance or fail the
//! item. Every step here is independently idempotent — nothing assumes it
//! runs exactly once, and a crash between "step ran" and "item
//! advanced" just re-runs the same step on the next lease.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use qb_content_store::ContentStore;
use qb_core::error::ErrorKind;
use qb_core::id::AstId;
use qb_core::model::{Ast, LookupEntry, QueueItem, Ref, Step, Symbol};
use qb_core::Event;
use qb_extract::ExtractionConfig;
use qb_queue::Queue;
use qb_storage::Store;
use qb_worker::{Op, WorkerPool};
use tracing::{debug, warn};

use crate::error::DaemonError;

/// What a step left behind for the caller to fold into run-level
/// counters. Only PARSE ever reports a nonzero `crashes_recovered` —
/// everything else defaults to zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepOutcome {
    pub crashes_recovered: u32,
}

struct StepFailure {
    kind: ErrorKind,
    message: String,
}

impl StepFailure {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        StepFailure { kind, message: message.into() }
    }
}

/// Run `item`'s pending step. A step failure is folded into the queue
/// via [`Queue::fail`] rather than returned as `Err` — only index or
/// storage failures propagate, since those abort the daemon.
#[allow(clippy::too_many_arguments)]
pub async fn run_step(
    store: &Store,
    queue: &Queue,
    content_store: &ContentStore,
    worker_pool: &WorkerPool,
    extraction_config: &ExtractionConfig,
    lease_duration: chrono::Duration,
    max_io_retries: u32,
    max_crash_retries: u32,
    item: &QueueItem,
) -> Result<StepOutcome, DaemonError> {
    let Some(step) = item.pending_step().cloned() else {
        queue.advance(item.queue_id, lease_duration)?;
        return Ok(StepOutcome::default());
    };

    let result = match &step {
        Step::Ingest => Ok(StepOutcome::default()),
        Step::Parse => run_parse(content_store, worker_pool, store, item).await,
        Step::Symbols => run_symbols(store, extraction_config, item).map(|()| StepOutcome::default()),
        Step::Refs => run_refs(store, extraction_config, item).map(|()| StepOutcome::default()),
        Step::LocalizationStep => run_localization(content_store, store, item).map(|()| StepOutcome::default()),
        Step::LookupKind(kind) => run_lookup(store, item, kind).map(|()| StepOutcome::default()),
    };

    match result {
        Ok(outcome) => {
            queue.advance(item.queue_id, lease_duration)?;
            debug!(queue_id = %item.queue_id, step = %step, "step completed");
            Ok(outcome)
        }
        Err(failure) => {
            let max_attempts = max_attempts_for(failure.kind, max_io_retries, max_crash_retries);
            warn!(queue_id = %item.queue_id, step = %step, error = %failure.message, "step failed");
            queue.fail(item.queue_id, failure.message, failure.kind, max_attempts)?;
            Ok(StepOutcome::default())
        }
    }
}

fn max_attempts_for(kind: ErrorKind, max_io_retries: u32, max_crash_retries: u32) -> u32 {
    match kind {
        ErrorKind::IoRead | ErrorKind::DbWrite => max_io_retries,
        ErrorKind::WorkerCrash | ErrorKind::Protocol => max_crash_retries,
        _ => 0,
    }
}

/// PARSE: reuse the existing AST when `content_hash` has
/// already been parsed anywhere in the store, minting a
/// content-addressed `ast_id` so any file sharing that hash — including
/// one that arrives under a different `file_id` later — converges on
/// the identical `ast_id` without any copy-forwarding logic of its own.
/// Otherwise dispatch `ParseText` to the worker pool: the daemon never
/// hands the worker a host path, only the bytes it already holds.
async fn run_parse(
    content_store: &ContentStore,
    worker_pool: &WorkerPool,
    store: &Store,
    item: &QueueItem,
) -> Result<StepOutcome, StepFailure> {
    if let Some(existing) = content_store.ast_for_hash(&item.content_hash) {
        let ast = Ast {
            ast_id: AstId::new(item.content_hash.clone()),
            file_id: item.file_id,
            node_count: existing.node_count,
            serialized_blob: existing.serialized_blob,
        };
        store.apply(Event::AstStored(ast)).map_err(db_fail)?;
        return Ok(StepOutcome::default());
    }

    let bytes = content_store
        .bytes_of_hash(&item.content_hash)
        .map_err(|e| StepFailure::new(ErrorKind::IoRead, e.to_string()))?;
    let text = String::from_utf8_lossy(&bytes).into_owned();

    let outcome = worker_pool
        .execute(Op::ParseText, Some(item.relative_path.clone()), Some(text), Some(true))
        .await
        .map_err(|e| StepFailure::new(ErrorKind::WorkerCrash, e.to_string()))?;

    let response = outcome.response;
    if !response.ok {
        let message = response
            .error
            .map(|e| format!("{}: {}", e.kind, e.message))
            .unwrap_or_else(|| "worker reported failure with no error detail".to_string());
        return Err(StepFailure::new(ErrorKind::ParseError, message));
    }
    for diagnostic in &response.diagnostics {
        debug!(file_id = %item.file_id, %diagnostic, "parser diagnostic");
    }

    let ast_base64 = response
        .ast
        .ok_or_else(|| StepFailure::new(ErrorKind::Protocol, "worker response missing `ast` field"))?;
    let serialized_blob = BASE64_STANDARD
        .decode(ast_base64)
        .map_err(|e| StepFailure::new(ErrorKind::Protocol, e.to_string()))?;
    let node_count = response.node_count.unwrap_or(0);

    let ast = Ast {
        ast_id: AstId::new(item.content_hash.clone()),
        file_id: item.file_id,
        node_count,
        serialized_blob,
    };
    store.apply(Event::AstStored(ast)).map_err(db_fail)?;

    Ok(StepOutcome { crashes_recovered: outcome.crashes_recovered })
}

/// SYMBOLS and REFS both call [`qb_extract::extract`] independently
/// rather than sharing one cached result: each persists only its own
/// half of the returned tuple, which keeps the two steps idempotent
/// without coordinating, at the cost of walking the AST twice.
fn extract_for(store: &Store, config: &ExtractionConfig, item: &QueueItem) -> Result<(Vec<Symbol>, Vec<Ref>), StepFailure> {
    let ast = store
        .state()
        .asts
        .get(&item.file_id)
        .cloned()
        .ok_or_else(|| StepFailure::new(ErrorKind::ExtractError, "no AST stored for this file; PARSE must run first"))?;
    let root = qb_ast_serde::deserialize_ast(&ast.serialized_blob)
        .map_err(|e| StepFailure::new(ErrorKind::ExtractError, e.to_string()))?;
    Ok(qb_extract::extract(&root, &item.relative_path, item.file_id, &item.content_version_id, config))
}

fn run_symbols(store: &Store, config: &ExtractionConfig, item: &QueueItem) -> Result<(), StepFailure> {
    let (symbols, _refs) = extract_for(store, config, item)?;
    store
        .apply(Event::SymbolsUpserted { file_id: item.file_id, symbols })
        .map_err(db_fail)?;
    Ok(())
}

fn run_refs(store: &Store, config: &ExtractionConfig, item: &QueueItem) -> Result<(), StepFailure> {
    let (_symbols, refs) = extract_for(store, config, item)?;
    store.apply(Event::RefsUpserted { file_id: item.file_id, refs }).map_err(db_fail)?;
    Ok(())
}

/// LOCALIZATION: never fails the item outright. Malformed lines
/// surface only as tracing warnings; `qb_loc::parse` already folds them
/// into its own diagnostics list rather than an `Err`.
fn run_localization(content_store: &ContentStore, store: &Store, item: &QueueItem) -> Result<(), StepFailure> {
    let bytes = content_store
        .bytes_of_hash(&item.content_hash)
        .map_err(|e| StepFailure::new(ErrorKind::IoRead, e.to_string()))?;
    let text = String::from_utf8_lossy(&bytes);
    let (entries, diagnostics) = qb_loc::parse(&text, item.file_id, &item.content_version_id);
    for diagnostic in &diagnostics {
        warn!(file_id = %item.file_id, %diagnostic, "localization diagnostic");
    }
    store
        .apply(Event::LocalizationUpserted { file_id: item.file_id, entries })
        .map_err(db_fail)?;
    Ok(())
}

/// `LOOKUP_<kind>`: derive rows from symbols this file already
/// contributed, filtered to the
/// envelope's kind. `kind` is the plural form carried by the envelope
/// name (`"traits"`); `Symbol::symbol_type` is singular (`"trait"`) per
/// [`qb_extract::ExtractionConfig::default_ck3`] — stripping a trailing
/// `s` bridges the two without a second configuration table.
fn run_lookup(store: &Store, item: &QueueItem, kind: &str) -> Result<(), StepFailure> {
    let symbol_type = kind.strip_suffix('s').unwrap_or(kind);
    let entries: Vec<LookupEntry> = store
        .state()
        .symbols
        .get(&item.file_id)
        .into_iter()
        .flatten()
        .filter(|symbol| symbol.symbol_type == symbol_type)
        .map(|symbol| LookupEntry {
            kind: kind.to_string(),
            name: symbol.name.clone(),
            symbol_id: symbol.symbol_id.clone(),
            file_id: item.file_id,
        })
        .collect();
    store
        .apply(Event::LookupEntriesUpserted {
            file_id: item.file_id,
            kind: kind.to_string(),
            entries,
        })
        .map_err(db_fail)?;
    Ok(())
}

fn db_fail(e: qb_storage::StoreError) -> StepFailure {
    StepFailure::new(ErrorKind::DbWrite, e.to_string())
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
