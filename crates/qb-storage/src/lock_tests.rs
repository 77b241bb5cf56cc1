// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn second_acquire_fails_while_first_is_held() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("build_lock");
    let first = BuildLock::acquire(&path).expect("first acquire");
    let second = BuildLock::acquire(&path);
    assert!(matches!(second, Err(LockError::AlreadyLocked { .. })));
    drop(first);
}

#[test]
fn lock_is_released_on_drop() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("build_lock");
    {
        let _first = BuildLock::acquire(&path).expect("first acquire");
    }
    let second = BuildLock::acquire(&path);
    assert!(second.is_ok());
}
