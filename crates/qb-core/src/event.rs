// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable event log vocabulary.
//!
//! Every mutation to the index or the queue is represented as an `Event`
//! before it is applied to [`crate::model`] rows. The WAL (`qb-storage`)
//! persists a sequence of these; [`crate::model`] rows are always derived
//! by replaying them, never mutated directly. Handlers that fold an event
//! into materialized state must be idempotent: replaying the same event
//! twice must not change the result of replaying it once.

use crate::id::{ContentVersionId, QueueId, RunId};
use crate::model::{
    Ast, BuildRunCounters, BuildRunStatus, ContentVersion, File, LocalizationEntry, LookupEntry,
    Playset, QueueItem, Ref, Symbol,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fact about a state change. Append-only; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A content version (vanilla release or mod version) was registered
    /// or re-registered (e.g. its `load_order` changed after a playset
    /// edit).
    ContentVersionRegistered(ContentVersion),

    /// A file was observed at discovery/ingest time. Upserted by its
    /// natural key `(content_version_id, relative_path)`; superseding
    /// writes carry a fresh `file_id`.
    FileRegistered(File),

    /// An AST was produced for a file. One per `file_id`.
    AstStored(Ast),

    /// Symbols extracted from one file's AST. Replacing the whole set for
    /// `file_id` keeps the SYMBOLS step idempotent without a separate
    /// delete event.
    SymbolsUpserted { file_id: crate::id::FileId, symbols: Vec<Symbol> },

    /// References extracted from one file's AST.
    RefsUpserted { file_id: crate::id::FileId, refs: Vec<Ref> },

    /// Localization entries parsed from one file.
    LocalizationUpserted {
        file_id: crate::id::FileId,
        entries: Vec<LocalizationEntry>,
    },

    /// Lookup-table rows produced by a `LOOKUP_<kind>` step.
    LookupEntriesUpserted {
        file_id: crate::id::FileId,
        kind: String,
        entries: Vec<LookupEntry>,
    },

    /// A playset was created or its root list replaced.
    PlaysetUpserted(Playset),

    /// A batch of work was admitted to the queue.
    QueueItemsEnqueued(Vec<QueueItem>),

    /// A lease was granted over a `pending` (or lease-expired `processing`)
    /// item.
    QueueItemLeased {
        queue_id: QueueId,
        holder: String,
        expires_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },

    /// A step completed; `current_step` advances, or the item reaches
    /// `done`. When the item stays `processing`, `refreshed_lease_expires_at`
    /// carries the new lease deadline ("remain processing with a
    /// refreshed lease"); `None` once the item is `done`.
    QueueItemAdvanced {
        queue_id: QueueId,
        next_step: usize,
        done: bool,
        refreshed_lease_expires_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },

    /// A step failed; classification decides whether this is terminal or
    /// will be retried.
    QueueItemFailed {
        queue_id: QueueId,
        message: String,
        kind: crate::error::ErrorKind,
        terminal: bool,
        at: DateTime<Utc>,
    },

    /// Administrative bulk reset back to `pending`.
    QueueItemReset { queue_id: QueueId, at: DateTime<Utc> },

    /// A new build run was opened.
    BuildRunStarted {
        run_id: RunId,
        started_at: DateTime<Utc>,
        trigger: String,
        config_snapshot: serde_json::Value,
    },

    /// Aggregate counters for a run were updated.
    BuildRunCountersUpdated { run_id: RunId, counters: BuildRunCounters },

    /// A build run closed, drained or aborted.
    BuildRunCompleted {
        run_id: RunId,
        completed_at: DateTime<Utc>,
        status: BuildRunStatus,
    },

    /// A worker crash was recorded against the run it happened under.
    WorkerCrashRecorded { run_id: RunId, queue_id: QueueId, at: DateTime<Utc> },

    /// No-op control signal; never replayed (mirrors the reference
    /// daemon's WAL-exempt shutdown signal).
    Shutdown,
}

impl Event {
    /// A short, stable name for logging (per-step JSONL fields).
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ContentVersionRegistered(_) => "content_version_registered",
            Event::FileRegistered(_) => "file_registered",
            Event::AstStored(_) => "ast_stored",
            Event::SymbolsUpserted { .. } => "symbols_upserted",
            Event::RefsUpserted { .. } => "refs_upserted",
            Event::LocalizationUpserted { .. } => "localization_upserted",
            Event::LookupEntriesUpserted { .. } => "lookup_entries_upserted",
            Event::PlaysetUpserted(_) => "playset_upserted",
            Event::QueueItemsEnqueued(_) => "queue_items_enqueued",
            Event::QueueItemLeased { .. } => "queue_item_leased",
            Event::QueueItemAdvanced { .. } => "queue_item_advanced",
            Event::QueueItemFailed { .. } => "queue_item_failed",
            Event::QueueItemReset { .. } => "queue_item_reset",
            Event::BuildRunStarted { .. } => "build_run_started",
            Event::BuildRunCountersUpdated { .. } => "build_run_counters_updated",
            Event::BuildRunCompleted { .. } => "build_run_completed",
            Event::WorkerCrashRecorded { .. } => "worker_crash_recorded",
            Event::Shutdown => "shutdown",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
