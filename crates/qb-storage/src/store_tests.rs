// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use qb_core::Event;
use tempfile::tempdir;

#[test]
fn a_second_open_of_the_same_root_is_refused() {
    let dir = tempdir().expect("tempdir");
    let store = Store::open(dir.path()).expect("first open");
    let err = Store::open(dir.path()).unwrap_err();
    assert!(matches!(err, StoreError::Lock(LockError::AlreadyLocked { .. })));
    drop(store);
}

#[test]
fn apply_is_visible_immediately_through_state() {
    let dir = tempdir().expect("tempdir");
    let store = Store::open(dir.path()).expect("open");
    let file = qb_core::test_support::file(1, "vanilla@1.13", "a.txt", "h1");
    store.apply(Event::FileRegistered(file)).expect("apply");

    assert!(store
        .state()
        .file_by_key(&qb_core::ContentVersionId::new("vanilla@1.13"), "a.txt")
        .is_some());
}

#[test]
fn state_survives_a_reopen_via_wal_replay() {
    let dir = tempdir().expect("tempdir");
    {
        let store = Store::open(dir.path()).expect("open");
        let file = qb_core::test_support::file(1, "vanilla@1.13", "a.txt", "h1");
        store.apply(Event::FileRegistered(file)).expect("apply");
    }
    let store = Store::open(dir.path()).expect("reopen");
    assert!(store
        .state()
        .file_by_key(&qb_core::ContentVersionId::new("vanilla@1.13"), "a.txt")
        .is_some());
}

#[test]
fn checkpoint_then_reopen_still_sees_state_via_snapshot() {
    let dir = tempdir().expect("tempdir");
    {
        let store = Store::open(dir.path()).expect("open");
        let file = qb_core::test_support::file(1, "vanilla@1.13", "a.txt", "h1");
        store.apply(Event::FileRegistered(file)).expect("apply");
        store.checkpoint().expect("checkpoint");
    }
    let store = Store::open(dir.path()).expect("reopen");
    assert!(store
        .state()
        .file_by_key(&qb_core::ContentVersionId::new("vanilla@1.13"), "a.txt")
        .is_some());
}

#[test]
fn open_fresh_discards_any_existing_state() {
    let dir = tempdir().expect("tempdir");
    {
        let store = Store::open(dir.path()).expect("open");
        let file = qb_core::test_support::file(1, "vanilla@1.13", "a.txt", "h1");
        store.apply(Event::FileRegistered(file)).expect("apply");
    }
    let store = Store::open_fresh(dir.path()).expect("open fresh");
    assert!(store
        .state()
        .file_by_key(&qb_core::ContentVersionId::new("vanilla@1.13"), "a.txt")
        .is_none());
}
