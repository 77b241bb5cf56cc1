// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The queue: durable, single-writer FIFO dispatch over
//! [`qb_storage::Store`]. All state transitions are events; this crate
//! only decides *which* event to write and lets `MaterializedState` fold
//! it idempotently.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

use std::sync::Arc;

use chrono::Duration;
use qb_core::id::{AtomicSeqGen, ContentVersionId, FileId, QueueId, SeqGen};
use qb_core::model::{Envelope, QueueItem, QueueItemStatus};
use qb_core::{Clock, ErrorKind, SystemClock};
use qb_storage::Store;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("no queue item with id {0}")]
    NotFound(QueueId),
    #[error(transparent)]
    Store(#[from] qb_storage::StoreError),
}

/// A unit of work a caller wants admitted (`enqueue_many`). The
/// queue mints `queue_id`, `steps`, and timestamps; callers supply only
/// what discovery/routing already knows.
#[derive(Debug, Clone)]
pub struct NewQueueItem {
    pub file_id: FileId,
    pub content_version_id: ContentVersionId,
    pub relative_path: String,
    pub content_hash: String,
    pub envelope: Envelope,
    pub priority: i32,
}

/// Per-candidate result of [`Queue::enqueue_many`].
#[derive(Debug, Clone)]
pub enum EnqueueOutcome {
    Admitted(QueueId),
    /// A non-terminal item already exists at this natural key.
    Deduplicated(QueueId),
}

/// Filter accepted by [`Queue::reset`]: an empty filter resets every
/// non-terminal item; an explicit `status` targets terminal items too,
/// e.g. re-queuing everything in `error`.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ResetFilter {
    pub status: Option<QueueItemStatus>,
    pub envelope: Option<Envelope>,
    pub content_version_id: Option<ContentVersionId>,
}

impl ResetFilter {
    fn matches(&self, item: &QueueItem) -> bool {
        let status_ok = match self.status {
            Some(status) => item.status == status,
            None => !item.is_terminal(),
        };
        status_ok
            && self.envelope.map_or(true, |e| item.envelope == e)
            && self
                .content_version_id
                .as_ref()
                .map_or(true, |cv| &item.content_version_id == cv)
    }
}

/// Thin API over `qb-storage`'s queue table.
pub struct Queue {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    queue_ids: AtomicSeqGen,
}

impl Queue {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        let next = store.state().queue_items.keys().map(|id| id.get()).max().unwrap_or(0) + 1;
        Queue {
            store,
            clock,
            queue_ids: AtomicSeqGen::starting_at(next),
        }
    }

    pub fn with_system_clock(store: Arc<Store>) -> Self {
        Self::new(store, Arc::new(SystemClock))
    }

    /// Atomic bulk insert; ignores duplicates where `(file_id,
    /// content_version_id, content_hash)` already exists in a non-terminal
    /// state.
    pub fn enqueue_many(&self, candidates: Vec<NewQueueItem>) -> Result<Vec<EnqueueOutcome>, QueueError> {
        let now = self.clock.now();
        let mut outcomes = Vec::with_capacity(candidates.len());
        let mut fresh_items = Vec::new();

        {
            let state = self.store.state();
            for candidate in candidates {
                if let Some(existing) =
                    state.non_terminal_queue_item_for(candidate.file_id, &candidate.content_version_id, &candidate.content_hash)
                {
                    outcomes.push(EnqueueOutcome::Deduplicated(existing.queue_id));
                    continue;
                }
                let queue_id = QueueId::new(self.queue_ids.next());
                let steps = candidate.envelope.steps();
                fresh_items.push(QueueItem {
                    queue_id,
                    file_id: candidate.file_id,
                    content_version_id: candidate.content_version_id,
                    relative_path: candidate.relative_path,
                    content_hash: candidate.content_hash,
                    envelope: candidate.envelope,
                    steps,
                    current_step: 0,
                    status: QueueItemStatus::Pending,
                    priority: candidate.priority,
                    error_message: None,
                    lease_holder: None,
                    lease_expires_at: None,
                    attempts: 0,
                    created_at: now,
                    updated_at: now,
                });
                outcomes.push(EnqueueOutcome::Admitted(queue_id));
            }
        }

        if !fresh_items.is_empty() {
            self.store.apply(qb_core::Event::QueueItemsEnqueued(fresh_items))?;
        }
        Ok(outcomes)
    }

    /// Atomically selects up to `batch_size` leasable items and marks them
    /// `processing` under `holder_id` (`lease`). Safe only under the
    /// single-writer invariant: exactly one caller ever holds a
    /// writable `Store` for a given storage root.
    pub fn lease(&self, batch_size: usize, lease_duration: Duration, holder_id: &str) -> Result<Vec<QueueItem>, QueueError> {
        let now = self.clock.now();
        let expires_at = now + lease_duration;

        let candidates: Vec<QueueId> = {
            let state = self.store.state();
            state.leasable_items(now).into_iter().take(batch_size).map(|item| item.queue_id).collect()
        };
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let events = candidates
            .iter()
            .map(|queue_id| qb_core::Event::QueueItemLeased {
                queue_id: *queue_id,
                holder: holder_id.to_string(),
                expires_at,
                at: now,
            })
            .collect();
        self.store.apply_batch(events)?;

        let state = self.store.state();
        Ok(candidates.iter().filter_map(|id| state.queue_items.get(id).cloned()).collect())
    }

    /// Advance `queue_id` to its next step, refreshing its lease for
    /// `lease_duration` unless that was the last step (`advance`).
    pub fn advance(&self, queue_id: QueueId, lease_duration: Duration) -> Result<(), QueueError> {
        let now = self.clock.now();
        let item = self
            .store
            .state()
            .queue_items
            .get(&queue_id)
            .cloned()
            .ok_or(QueueError::NotFound(queue_id))?;

        let next_step = item.current_step + 1;
        let done = next_step >= item.steps.len();
        let refreshed_lease_expires_at = if done { None } else { Some(now + lease_duration) };

        self.store.apply(qb_core::Event::QueueItemAdvanced {
            queue_id,
            next_step,
            done,
            refreshed_lease_expires_at,
            at: now,
        })?;
        Ok(())
    }

    /// Transition `queue_id` to `error` with `message`/`kind`, or back to
    /// `pending` for a retry when `kind` is retryable and attempts remain
    /// (`fail`).
    pub fn fail(&self, queue_id: QueueId, message: impl Into<String>, kind: ErrorKind, max_attempts: u32) -> Result<(), QueueError> {
        let now = self.clock.now();
        let item = self
            .store
            .state()
            .queue_items
            .get(&queue_id)
            .cloned()
            .ok_or(QueueError::NotFound(queue_id))?;

        let terminal = !kind.is_retryable() || item.attempts + 1 >= max_attempts;
        self.store.apply(qb_core::Event::QueueItemFailed {
            queue_id,
            message: message.into(),
            kind,
            terminal,
            at: now,
        })?;
        Ok(())
    }

    /// Administrative bulk reset back to `pending` (`reset`).
    pub fn reset(&self, filter: &ResetFilter) -> Result<usize, QueueError> {
        let now = self.clock.now();
        let matching: Vec<QueueId> = self
            .store
            .state()
            .queue_items
            .values()
            .filter(|item| filter.matches(item))
            .map(|item| item.queue_id)
            .collect();
        if matching.is_empty() {
            return Ok(0);
        }
        let events = matching
            .iter()
            .map(|queue_id| qb_core::Event::QueueItemReset { queue_id: *queue_id, at: now })
            .collect();
        self.store.apply_batch(events)?;
        Ok(matching.len())
    }

    pub fn counts(&self) -> qb_storage::QueueCounts {
        self.store.state().queue_counts()
    }

    pub fn item(&self, queue_id: QueueId) -> Option<QueueItem> {
        self.store.state().queue_items.get(&queue_id).cloned()
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
