// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process-wide `build_lock` mutex (exit code 3): prevents a
//! second daemon from starting against the same index.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("IO error acquiring build lock at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("index at {path} is locked by another daemon")]
    AlreadyLocked { path: String },
}

/// An exclusive, advisory file lock held for the daemon process's
/// lifetime. Dropping it releases the lock (process exit does too, since
/// the OS releases flocks on close).
pub struct BuildLock {
    _file: File,
    path: PathBuf,
}

impl BuildLock {
    /// Acquire the lock, writing the current PID into the lock file for
    /// diagnostics. Returns [`LockError::AlreadyLocked`] if another daemon
    /// already holds it — the caller maps this to exit code 3.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LockError::Io {
                path: path.display().to_string(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|source| LockError::Io {
                path: path.display().to_string(),
                source,
            })?;

        file.try_lock_exclusive().map_err(|_| LockError::AlreadyLocked {
            path: path.display().to_string(),
        })?;

        use std::io::Write;
        let mut writer = &file;
        let _ = write!(writer, "{}", std::process::id());

        Ok(BuildLock {
            _file: file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
