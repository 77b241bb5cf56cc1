use std::sync::Arc;

use qb_content_store::ContentStore;
use qb_core::id::ContentVersionId;
use qb_core::model::PlaysetRoot;
use qb_queue::Queue;
use qb_router::RoutingTable;
use qb_storage::Store;
use tempfile::tempdir;

use super::*;

const ROUTING: &str = r#"
envelope "SCRIPT_FULL" { steps = ["INGEST", "PARSE", "SYMBOLS", "REFS"] }
envelope "LOCALIZATION" { steps = ["INGEST", "LOCALIZATION"] }
envelope "INGEST_ONLY" { steps = ["INGEST"] }

route { pattern = "common/traits/**" envelope = "SCRIPT_FULL" }
route { pattern = "localization/**/*.yml" envelope = "LOCALIZATION" }
route { pattern = "**/*.dds" envelope = "SKIP" }
route { pattern = "**" envelope = "INGEST_ONLY" }
"#;

fn fixture_root() -> tempfile::TempDir {
    let dir = tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("common/traits")).expect("mkdir");
    std::fs::write(
        dir.path().join("common/traits/00_traits.txt"),
        "trait_brave = { name = \"brave\" }",
    )
    .expect("write fixture");
    std::fs::create_dir_all(dir.path().join("localization/english")).expect("mkdir");
    std::fs::write(dir.path().join("localization/english/my_l_english.yml"), "l_english:\n").expect("write fixture");
    std::fs::create_dir_all(dir.path().join("gfx/portraits")).expect("mkdir");
    std::fs::write(dir.path().join("gfx/portraits/icon.dds"), b"\x00\x01").expect("write fixture");
    dir
}

#[test]
fn scan_root_routes_ingests_and_enqueues() {
    let storage = tempdir().expect("tempdir");
    let store = Arc::new(Store::open(storage.path()).expect("open store"));
    let content_store = ContentStore::new(Arc::clone(&store), storage.path());
    let router = RoutingTable::parse(ROUTING).expect("valid routing table");
    let queue = Queue::with_system_clock(Arc::clone(&store));

    let root = fixture_root();
    let content_version_id = ContentVersionId::new("vanilla@test");
    let stats = scan_root(&content_store, &router, &queue, &content_version_id, root.path()).expect("scan succeeds");

    assert_eq!(stats.files_seen, 3);
    assert_eq!(stats.skipped, 1, "the .dds file is routed to SKIP");
    assert_eq!(stats.routed, 2);
    assert_eq!(stats.enqueued, 2);

    let counts = queue.counts();
    assert_eq!(counts.pending, 2);
}

#[test]
fn rescanning_an_unchanged_root_deduplicates_the_queue() {
    let storage = tempdir().expect("tempdir");
    let store = Arc::new(Store::open(storage.path()).expect("open store"));
    let content_store = ContentStore::new(Arc::clone(&store), storage.path());
    let router = RoutingTable::parse(ROUTING).expect("valid routing table");
    let queue = Queue::with_system_clock(Arc::clone(&store));

    let root = fixture_root();
    let content_version_id = ContentVersionId::new("vanilla@test");
    scan_root(&content_store, &router, &queue, &content_version_id, root.path()).expect("first scan");
    let second = scan_root(&content_store, &router, &queue, &content_version_id, root.path()).expect("second scan");

    // both leased-free items from the first pass are still non-terminal,
    // so the second pass's enqueue attempts are suppressed as duplicates.
    assert_eq!(second.deduplicated_queue, 2);
    assert_eq!(second.enqueued, 0);
    assert_eq!(queue.counts().pending, 2);
}

#[test]
fn disabled_roots_are_skipped_entirely() {
    let storage = tempdir().expect("tempdir");
    let store = Arc::new(Store::open(storage.path()).expect("open store"));
    let content_store = ContentStore::new(Arc::clone(&store), storage.path());
    let router = RoutingTable::parse(ROUTING).expect("valid routing table");
    let queue = Queue::with_system_clock(Arc::clone(&store));

    let root = fixture_root();
    let roots = vec![PlaysetRoot {
        content_version_id: ContentVersionId::new("mod:disabled@1"),
        root_path: root.path().to_string_lossy().into_owned(),
        enabled: false,
    }];
    let stats = scan_playset(&content_store, &router, &queue, &roots).expect("scan succeeds");

    assert_eq!(stats.files_seen, 0);
    assert_eq!(queue.counts().pending, 0);
}
