// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The content store: content-addressed blob storage plus the
//! `(content_version, relative_path) -> file_id -> content_hash`
//! registration that backs the `File` entity.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

use chrono::{DateTime, Utc};
use qb_core::id::{AtomicSeqGen, ContentVersionId, FileId, SeqGen};
use qb_core::model::{Ast, File};
use qb_core::Event;
use qb_storage::Store;
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ContentStoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write blob {hash}: {source}")]
    Write {
        hash: String,
        #[source]
        source: io::Error,
    },
    #[error("no blob stored for content_hash {0}")]
    MissingBlob(String),
    #[error("no file registered with file_id {0}")]
    MissingFile(FileId),
    #[error(transparent)]
    Store(#[from] qb_storage::StoreError),
}

/// Result of [`ContentStore::ingest`].
#[derive(Debug, Clone)]
pub struct IngestResult {
    pub file_id: FileId,
    pub content_hash: String,
    /// True when the prior `content_hash` at this `(content_version,
    /// relative_path)` key equaled the new one.
    pub deduplicated: bool,
}

/// Content-addressed storage over a [`Store`]: raw bytes live under
/// `blobs/<hash prefix>/<hash>`, append-only; the `File` registration
/// itself is a row in the index, mutated only through durable events.
pub struct ContentStore {
    store: Arc<Store>,
    blobs_root: PathBuf,
    file_ids: AtomicSeqGen,
}

impl ContentStore {
    /// Open a content store rooted at `storage_root` (blobs live in
    /// `storage_root/blobs`), sharing `store`'s index for `File`
    /// registration.
    pub fn new(store: Arc<Store>, storage_root: &Path) -> Self {
        let next_file_id = store.state().files.keys().map(|id| id.get()).max().unwrap_or(0) + 1;
        ContentStore {
            store,
            blobs_root: storage_root.join("blobs"),
            file_ids: AtomicSeqGen::starting_at(next_file_id),
        }
    }

    fn blob_path(&self, content_hash: &str) -> PathBuf {
        let prefix = &content_hash[..content_hash.len().min(2)];
        self.blobs_root.join(prefix).join(content_hash)
    }

    /// Digest `path`'s bytes, register a `File` row under the natural key
    /// `(content_version, relative_path)`, and return whether the prior
    /// hash at that key (if any) was unchanged.
    pub fn ingest(
        &self,
        path: &Path,
        content_version_id: ContentVersionId,
        relative_path: &str,
    ) -> Result<IngestResult, ContentStoreError> {
        let bytes = std::fs::read(path).map_err(|source| ContentStoreError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let metadata = std::fs::metadata(path).map_err(|source| ContentStoreError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let content_hash = hex_digest(&bytes);
        let mtime: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let prior = self.store.state().file_by_key(&content_version_id, relative_path).cloned();
        if let Some(prior) = &prior {
            if prior.content_hash == content_hash {
                return Ok(IngestResult {
                    file_id: prior.file_id,
                    content_hash,
                    deduplicated: true,
                });
            }
        }

        self.write_blob(&content_hash, &bytes)?;

        let file_id = FileId::new(self.file_ids.next());
        let file = File {
            file_id,
            content_version_id,
            relative_path: relative_path.to_string(),
            content_hash: content_hash.clone(),
            size: bytes.len() as u64,
            mtime,
        };
        self.store.apply(Event::FileRegistered(file))?;

        debug!(%file_id, %content_hash, relative_path, "ingested file");
        Ok(IngestResult {
            file_id,
            content_hash,
            deduplicated: false,
        })
    }

    fn write_blob(&self, content_hash: &str, bytes: &[u8]) -> Result<(), ContentStoreError> {
        let path = self.blob_path(content_hash);
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ContentStoreError::Write {
                hash: content_hash.to_string(),
                source,
            })?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes).map_err(|source| ContentStoreError::Write {
            hash: content_hash.to_string(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| ContentStoreError::Write {
            hash: content_hash.to_string(),
            source,
        })?;
        Ok(())
    }

    /// Whether an AST already exists with this hash anywhere in the store;
    /// enables the PARSE step to skip re-parsing.
    pub fn already_parsed(&self, content_hash: &str) -> bool {
        self.store.state().already_parsed(content_hash)
    }

    /// The existing AST for `content_hash`, if the PARSE step can reuse it
    /// instead of re-parsing.
    pub fn ast_for_hash(&self, content_hash: &str) -> Option<Ast> {
        self.store.state().ast_for_hash(content_hash).cloned()
    }

    /// Retrieve raw content for a registered file.
    pub fn bytes_of(&self, file_id: FileId) -> Result<Vec<u8>, ContentStoreError> {
        let content_hash = self
            .store
            .state()
            .files
            .get(&file_id)
            .map(|f| f.content_hash.clone())
            .ok_or(ContentStoreError::MissingFile(file_id))?;
        self.bytes_of_hash(&content_hash)
    }

    /// Retrieve raw content directly by hash (used by workers that only
    /// have the hash, not a `file_id`).
    pub fn bytes_of_hash(&self, content_hash: &str) -> Result<Vec<u8>, ContentStoreError> {
        let path = self.blob_path(content_hash);
        std::fs::read(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ContentStoreError::MissingBlob(content_hash.to_string())
            } else {
                ContentStoreError::Read {
                    path: path.display().to_string(),
                    source,
                }
            }
        })
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
