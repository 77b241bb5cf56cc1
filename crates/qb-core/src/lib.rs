// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Shared types for QBuilder: the data model, ID generation, the
//! error taxonomy, and clock abstractions used throughout the pipeline.
//!
//! This crate does no I/O; it is depended on by every other `qb-*` crate.

pub mod clock;
pub mod error;
pub mod event;
pub mod id;
pub mod model;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{Diagnostic, ErrorKind, StepError};
pub use event::Event;
pub use id::{
    AstId, ContentVersionId, FileId, IdGen, LocId, PlaysetId, QueueId, RefId, RunId, SeqGen,
    SequentialIdGen, ShortId, SymbolId, UuidIdGen,
};
pub use model::{
    Ast, BuildRun, BuildRunCounters, BuildRunStatus, ContentVersion, Envelope, File,
    LocalizationEntry, LookupEntry, Origin, Playset, PlaysetRoot, QueueItem, QueueItemStatus, Ref,
    ResolutionStatus, Step, Symbol,
};
