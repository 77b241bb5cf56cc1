// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state derived by folding the WAL's [`Event`] stream.
//!
//! Nothing here is ever mutated directly by callers; every change arrives
//! as an event and [`MaterializedState::apply_event`] is the single place
//! that interprets it. Handlers must be idempotent: applying the same
//! event twice must leave the state exactly as applying it once would.

use qb_core::id::{ContentVersionId, FileId, PlaysetId, QueueId, RunId};
use qb_core::model::{
    Ast, BuildRun, BuildRunStatus, ContentVersion, File, LocalizationEntry, LookupEntry, Playset,
    QueueItem, QueueItemStatus, Ref, Symbol,
};
use qb_core::Event;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Every index table named in plus the queue and build-run registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterializedState {
    pub content_versions: HashMap<ContentVersionId, ContentVersion>,
    pub files: HashMap<FileId, File>,
    /// `(content_version_id, relative_path) -> file_id`, the natural key a
    /// File is identified by (File entity). Not serialized directly
    /// (its key is not a plain string); rebuilt from `files` by
    /// [`MaterializedState::rebuild_indices`] after loading a snapshot.
    #[serde(skip)]
    files_by_key: HashMap<(ContentVersionId, String), FileId>,
    pub asts: HashMap<FileId, Ast>,
    /// `content_hash -> file_id of the first file that produced this AST`,
    /// backing [`MaterializedState::already_parsed`].
    asts_by_hash: HashMap<String, FileId>,
    pub symbols: HashMap<FileId, Vec<Symbol>>,
    pub refs: HashMap<FileId, Vec<Ref>>,
    pub localization_entries: HashMap<FileId, Vec<LocalizationEntry>>,
    /// `kind -> name -> rows`, the LOOKUP_* table.
    #[serde(default)]
    pub lookup_entries: HashMap<String, HashMap<String, Vec<LookupEntry>>>,
    pub playsets: HashMap<PlaysetId, Playset>,
    pub queue_items: BTreeMap<QueueId, QueueItem>,
    /// `(file_id, content_version_id, content_hash) -> queue_id` for a
    /// non-terminal item, backing `enqueue_many`'s duplicate suppression.
    /// Rebuilt the same way as `files_by_key`.
    #[serde(skip)]
    queue_natural_keys: HashMap<(FileId, ContentVersionId, String), QueueId>,
    pub build_runs: HashMap<RunId, BuildRun>,
}

impl MaterializedState {
    /// Reconstruct the non-serialized natural-key indices from primary
    /// state. Must be called once after loading a snapshot from disk,
    /// before replaying WAL entries on top of it.
    pub fn rebuild_indices(&mut self) {
        self.files_by_key.clear();
        for file in self.files.values() {
            self.files_by_key
                .insert((file.content_version_id.clone(), file.relative_path.clone()), file.file_id);
        }
        self.queue_natural_keys.clear();
        for item in self.queue_items.values() {
            self.queue_natural_keys.insert(
                (item.file_id, item.content_version_id.clone(), item.content_hash.clone()),
                item.queue_id,
            );
        }
    }

    pub fn file_by_key(&self, content_version_id: &ContentVersionId, relative_path: &str) -> Option<&File> {
        self.files_by_key
            .get(&(content_version_id.clone(), relative_path.to_string()))
            .and_then(|id| self.files.get(id))
    }

    /// Whether an AST already exists with this hash anywhere in the store,
    /// regardless of `file_id` (`already_parsed`, cross-file/cross-mod
    /// dedup).
    pub fn already_parsed(&self, content_hash: &str) -> bool {
        self.asts_by_hash.contains_key(content_hash)
    }

    /// The AST reusable for `content_hash`, if any (so a superseding file
    /// with an identical hash can adopt the existing `ast_id` without
    /// re-parsing).
    pub fn ast_for_hash(&self, content_hash: &str) -> Option<&Ast> {
        self.asts_by_hash
            .get(content_hash)
            .and_then(|file_id| self.asts.get(file_id))
    }

    pub fn lookup(&self, kind: &str, name: &str) -> &[LookupEntry] {
        self.lookup_entries
            .get(kind)
            .and_then(|by_name| by_name.get(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Items eligible for leasing: `pending`, or `processing` with an
    /// expired lease, ordered FIFO by `queue_id` within descending
    /// priority.
    pub fn leasable_items(&self, now: chrono::DateTime<chrono::Utc>) -> Vec<&QueueItem> {
        let mut items: Vec<&QueueItem> = self
            .queue_items
            .values()
            .filter(|item| match item.status {
                QueueItemStatus::Pending => true,
                QueueItemStatus::Processing => {
                    item.lease_expires_at.map(|exp| exp < now).unwrap_or(false)
                }
                _ => false,
            })
            .collect();
        items.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.queue_id.cmp(&b.queue_id)));
        items
    }

    /// The non-terminal queue item already covering `(file_id,
    /// content_version_id, content_hash)`, if any — the same natural key
    /// `enqueue_many` deduplicates against.
    pub fn non_terminal_queue_item_for(
        &self,
        file_id: FileId,
        content_version_id: &ContentVersionId,
        content_hash: &str,
    ) -> Option<&QueueItem> {
        let key = (file_id, content_version_id.clone(), content_hash.to_string());
        self.queue_natural_keys
            .get(&key)
            .and_then(|id| self.queue_items.get(id))
            .filter(|item| !item.is_terminal())
    }

    pub fn queue_counts(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for item in self.queue_items.values() {
            match item.status {
                QueueItemStatus::Pending => counts.pending += 1,
                QueueItemStatus::Processing => counts.processing += 1,
                QueueItemStatus::Done => counts.done += 1,
                QueueItemStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    /// Apply a durable event, folding it into the appropriate table.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::ContentVersionRegistered(cv) => {
                self.content_versions.insert(cv.content_version_id.clone(), cv.clone());
            }

            Event::FileRegistered(file) => {
                let key = (file.content_version_id.clone(), file.relative_path.clone());
                self.files_by_key.insert(key, file.file_id);
                self.files.insert(file.file_id, file.clone());
            }

            Event::AstStored(ast) => {
                if let Some(file) = self.files.get(&ast.file_id) {
                    self.asts_by_hash
                        .entry(file.content_hash.clone())
                        .or_insert(ast.file_id);
                }
                self.asts.insert(ast.file_id, ast.clone());
            }

            Event::SymbolsUpserted { file_id, symbols } => {
                self.symbols.insert(*file_id, symbols.clone());
            }

            Event::RefsUpserted { file_id, refs } => {
                self.refs.insert(*file_id, refs.clone());
            }

            Event::LocalizationUpserted { file_id, entries } => {
                self.localization_entries.insert(*file_id, entries.clone());
            }

            Event::LookupEntriesUpserted { file_id, kind, entries } => {
                let by_name = self.lookup_entries.entry(kind.clone()).or_default();
                for entry in entries {
                    let bucket = by_name.entry(entry.name.clone()).or_default();
                    if !bucket.iter().any(|e| e.file_id == *file_id && e.symbol_id == entry.symbol_id) {
                        bucket.push(entry.clone());
                    }
                }
            }

            Event::PlaysetUpserted(playset) => {
                self.playsets.insert(playset.playset_id.clone(), playset.clone());
            }

            Event::QueueItemsEnqueued(items) => {
                for item in items {
                    let key = (
                        item.file_id,
                        item.content_version_id.clone(),
                        item.content_hash.clone(),
                    );
                    if let Some(existing) = self.queue_natural_keys.get(&key) {
                        if let Some(existing_item) = self.queue_items.get(existing) {
                            if !existing_item.is_terminal() {
                                continue; // duplicate of a non-terminal item; ignore
                            }
                        }
                    }
                    self.queue_natural_keys.insert(key, item.queue_id);
                    self.queue_items.insert(item.queue_id, item.clone());
                }
            }

            Event::QueueItemLeased { queue_id, holder, expires_at, at } => {
                if let Some(item) = self.queue_items.get_mut(queue_id) {
                    item.status = QueueItemStatus::Processing;
                    item.lease_holder = Some(holder.clone());
                    item.lease_expires_at = Some(*expires_at);
                    item.updated_at = *at;
                }
            }

            Event::QueueItemAdvanced { queue_id, next_step, done, refreshed_lease_expires_at, at } => {
                if let Some(item) = self.queue_items.get_mut(queue_id) {
                    item.current_step = *next_step;
                    item.status = if *done {
                        QueueItemStatus::Done
                    } else {
                        QueueItemStatus::Processing
                    };
                    item.lease_expires_at = *refreshed_lease_expires_at;
                    item.updated_at = *at;
                }
            }

            Event::QueueItemFailed { queue_id, message, kind, terminal, at } => {
                if let Some(item) = self.queue_items.get_mut(queue_id) {
                    item.attempts += 1;
                    item.updated_at = *at;
                    if *terminal {
                        item.status = QueueItemStatus::Error;
                        item.error_message = Some(message.clone());
                    } else {
                        item.status = QueueItemStatus::Pending;
                        item.lease_holder = None;
                        item.lease_expires_at = None;
                        item.error_message = Some(format!("{kind}: {message} (retrying)"));
                    }
                }
            }

            Event::QueueItemReset { queue_id, at } => {
                if let Some(item) = self.queue_items.get_mut(queue_id) {
                    item.status = QueueItemStatus::Pending;
                    item.current_step = 0;
                    item.lease_holder = None;
                    item.lease_expires_at = None;
                    item.error_message = None;
                    item.attempts = 0;
                    item.updated_at = *at;
                }
            }

            Event::BuildRunStarted { run_id, started_at, trigger, config_snapshot } => {
                self.build_runs.entry(run_id.clone()).or_insert_with(|| BuildRun {
                    run_id: run_id.clone(),
                    started_at: *started_at,
                    completed_at: None,
                    status: BuildRunStatus::Running,
                    trigger: trigger.clone(),
                    config_snapshot: config_snapshot.clone(),
                    counters: Default::default(),
                });
            }

            Event::BuildRunCountersUpdated { run_id, counters } => {
                if let Some(run) = self.build_runs.get_mut(run_id) {
                    run.counters = counters.clone();
                }
            }

            Event::BuildRunCompleted { run_id, completed_at, status } => {
                if let Some(run) = self.build_runs.get_mut(run_id) {
                    run.completed_at = Some(*completed_at);
                    run.status = *status;
                }
            }

            Event::WorkerCrashRecorded { run_id, .. } => {
                if let Some(run) = self.build_runs.get_mut(run_id) {
                    run.counters.worker_crashes += 1;
                }
            }

            Event::Shutdown => {}
        }
    }
}

/// Aggregate queue breakdown for `status` (user-visible behavior).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub pending: u64,
    pub processing: u64,
    pub done: u64,
    pub error: u64,
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
