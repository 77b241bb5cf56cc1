// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discovery (lifecycle step 3): walk each enabled playset root in
//! load order, route every regular file, and hand the router's verdict
//! to content-store ingest and the queue. The router is the sole
//! authority on what gets indexed — discovery never inspects file
//! contents itself.

use std::path::Path;

use qb_content_store::ContentStore;
use qb_core::id::ContentVersionId;
use qb_core::model::PlaysetRoot;
use qb_queue::{EnqueueOutcome, NewQueueItem, Queue};
use qb_router::{RouteOutcome, RoutingTable};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::DaemonError;

/// Aggregate counts from one discovery pass, folded into
/// [`qb_core::model::BuildRunCounters::files_discovered`] by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveryStats {
    pub files_seen: u64,
    pub routed: u64,
    pub skipped: u64,
    pub enqueued: u64,
    pub deduplicated_queue: u64,
    pub read_errors: u64,
}

impl DiscoveryStats {
    fn merge(&mut self, other: DiscoveryStats) {
        self.files_seen += other.files_seen;
        self.routed += other.routed;
        self.skipped += other.skipped;
        self.enqueued += other.enqueued;
        self.deduplicated_queue += other.deduplicated_queue;
        self.read_errors += other.read_errors;
    }
}

/// Walk every enabled root of `roots` (in the order given — lowest-priority
/// root first) and enqueue routed files. Disabled roots are skipped
/// entirely.
pub fn scan_playset(
    content_store: &ContentStore,
    router: &RoutingTable,
    queue: &Queue,
    roots: &[PlaysetRoot],
) -> Result<DiscoveryStats, DaemonError> {
    let mut stats = DiscoveryStats::default();
    for root in roots {
        if !root.enabled {
            debug!(content_version_id = %root.content_version_id, "skipping disabled root");
            continue;
        }
        let root_stats = scan_root(content_store, router, queue, &root.content_version_id, Path::new(&root.root_path))?;
        stats.merge(root_stats);
    }
    info!(
        files_seen = stats.files_seen,
        routed = stats.routed,
        skipped = stats.skipped,
        enqueued = stats.enqueued,
        "discovery pass complete"
    );
    Ok(stats)
}

/// Walk a single content version's root and enqueue its routed files.
pub fn scan_root(
    content_store: &ContentStore,
    router: &RoutingTable,
    queue: &Queue,
    content_version_id: &ContentVersionId,
    root_path: &Path,
) -> Result<DiscoveryStats, DaemonError> {
    let mut stats = DiscoveryStats::default();
    let mut candidates = Vec::new();

    for entry in WalkDir::new(root_path).follow_links(false).into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "failed to walk a directory entry, skipping it");
                stats.read_errors += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        stats.files_seen += 1;

        let relative_path = relative_path_of(root_path, entry.path());
        let outcome = match router.route(&relative_path) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(relative_path, error = %e, "router could not classify path");
                continue;
            }
        };

        match outcome {
            RouteOutcome::Skip => {
                stats.skipped += 1;
            }
            RouteOutcome::Route { envelope, .. } => {
                stats.routed += 1;
                let ingested = match content_store.ingest(entry.path(), content_version_id.clone(), &relative_path) {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(relative_path, error = %e, "failed to ingest file");
                        stats.read_errors += 1;
                        continue;
                    }
                };
                candidates.push(NewQueueItem {
                    file_id: ingested.file_id,
                    content_version_id: content_version_id.clone(),
                    relative_path,
                    content_hash: ingested.content_hash,
                    envelope,
                    priority: 0,
                });
            }
        }
    }

    if !candidates.is_empty() {
        let outcomes = queue.enqueue_many(candidates)?;
        for outcome in outcomes {
            match outcome {
                EnqueueOutcome::Admitted(_) => stats.enqueued += 1,
                EnqueueOutcome::Deduplicated(_) => stats.deduplicated_queue += 1,
            }
        }
    }

    Ok(stats)
}

/// Canonical root-relative, forward-slashed path — only this form ever
/// reaches the index.
fn relative_path_of(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
