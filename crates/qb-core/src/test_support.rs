// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test fixtures for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::clock::now;
use crate::id::{ContentVersionId, FileId, QueueId};
use crate::model::{Envelope, Origin, QueueItem, QueueItemStatus};

pub fn content_version(id: &str, load_order: u32) -> crate::model::ContentVersion {
    crate::model::ContentVersion {
        content_version_id: ContentVersionId::new(id),
        display_name: id.to_string(),
        origin: if load_order == 0 {
            Origin::Vanilla
        } else {
            Origin::Workshop
        },
        load_order,
    }
}

pub fn file(file_id: u64, content_version_id: &str, relative_path: &str, hash: &str) -> crate::model::File {
    crate::model::File {
        file_id: FileId::new(file_id),
        content_version_id: ContentVersionId::new(content_version_id),
        relative_path: relative_path.to_string(),
        content_hash: hash.to_string(),
        size: 0,
        mtime: now(),
    }
}

pub fn pending_queue_item(
    queue_id: u64,
    file_id: u64,
    content_version_id: &str,
    relative_path: &str,
    hash: &str,
    envelope: Envelope,
) -> QueueItem {
    let t = now();
    QueueItem {
        queue_id: QueueId::new(queue_id),
        file_id: FileId::new(file_id),
        content_version_id: ContentVersionId::new(content_version_id),
        relative_path: relative_path.to_string(),
        content_hash: hash.to_string(),
        steps: envelope.steps(),
        envelope,
        current_step: 0,
        status: QueueItemStatus::Pending,
        priority: 0,
        error_message: None,
        lease_holder: None,
        lease_expires_at: None,
        attempts: 0,
        created_at: t,
        updated_at: t,
    }
}
