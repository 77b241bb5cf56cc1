// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! Persistence substrate for QBuilder's index and queue.
//!
//! Event-sourced: a durable JSONL WAL of [`qb_core::Event`]s, a
//! [`MaterializedState`]
//! derived by folding them, and periodic zstd-compressed snapshots so
//! startup need not replay from the beginning of time. Only the daemon
//! process writes through [`Store`]; the `build_lock` (exit code 3)
//! enforces that a second daemon cannot.

mod lock;
mod snapshot;
mod state;
mod store;
mod wal;

pub use lock::{BuildLock, LockError};
pub use snapshot::{Snapshot, SnapshotError};
pub use state::{MaterializedState, QueueCounts};
pub use store::{Store, StoreError};
pub use wal::{Wal, WalEntry, WalError};
