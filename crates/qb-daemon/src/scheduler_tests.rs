use std::sync::Arc;

use qb_content_store::ContentStore;
use qb_core::id::{ContentVersionId, RunId};
use qb_core::model::{BuildRunStatus, PlaysetRoot};
use qb_queue::Queue;
use qb_router::RoutingTable;
use qb_storage::Store;
use qb_worker::{WorkerPool, WorkerPoolConfig};
use tempfile::tempdir;

use super::*;

const ROUTING_FIXTURE: &str = r#"
envelope "SCRIPT_FULL" { steps = ["INGEST", "PARSE", "SYMBOLS", "REFS"] }

route { pattern = "common/traits/**" envelope = "SCRIPT_FULL" }
route { pattern = "**" envelope = "SKIP" }
"#;

fn workerd_path() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_BIN_EXE_qb-workerd"))
}

async fn fixture_scheduler() -> (Arc<Scheduler>, tempfile::TempDir, tempfile::TempDir) {
    let storage = tempdir().expect("storage tempdir");
    let sources = tempdir().expect("sources tempdir");

    let store = Arc::new(Store::open(storage.path()).expect("open store"));
    let router = Arc::new(RoutingTable::parse(ROUTING_FIXTURE).expect("valid routing table"));
    let queue = Arc::new(Queue::with_system_clock(Arc::clone(&store)));
    let content_store = Arc::new(ContentStore::new(Arc::clone(&store), storage.path()));
    let worker_pool = Arc::new(WorkerPool::start(WorkerPoolConfig::new(workerd_path(), 1)).await.expect("pool starts"));
    let run_log = RunLog::open(&storage.path().join("logs")).expect("open run log");

    let config = Config {
        storage_root: storage.path().to_path_buf(),
        routing_table_path: storage.path().join("routing.hcl"),
        playset_path: storage.path().join("playset.json"),
        workerd_path: workerd_path(),
        logs_dir: storage.path().join("logs"),
        daemon_log_path: storage.path().join("daemon.log"),
        control_port: 0,
        worker_pool_size: 1,
        lease_batch_size: 8,
        lease_duration: chrono::Duration::seconds(60),
        request_timeout: std::time::Duration::from_secs(10),
        cold_start_budget: std::time::Duration::from_millis(1_000),
        recycle_after: 500,
        max_crash_retries: 2,
        max_io_retries: 3,
        drain_deadline: std::time::Duration::from_secs(5),
    };

    let run_id = RunId::new("test-run");
    store
        .apply(qb_core::Event::BuildRunStarted {
            run_id: run_id.clone(),
            started_at: chrono::Utc::now(),
            trigger: "test".to_string(),
            config_snapshot: serde_json::json!({}),
        })
        .expect("apply BuildRunStarted");

    let scheduler = Arc::new(Scheduler::new(store, queue, content_store, router, worker_pool, config, run_id, run_log));
    (scheduler, storage, sources)
}

#[tokio::test]
async fn enqueue_scan_routes_and_enqueues_then_run_drains_to_done() {
    let (scheduler, _storage, sources) = fixture_scheduler().await;

    let root_dir = sources.path().join("mod-a");
    std::fs::create_dir_all(root_dir.join("common/traits")).expect("mkdir");
    std::fs::write(root_dir.join("common/traits/00_traits.txt"), "trait_brave = { icon = brave_icon }").expect("write fixture");

    let roots = vec![PlaysetRoot {
        content_version_id: ContentVersionId::new("mod-a@1"),
        root_path: root_dir.to_string_lossy().to_string(),
        enabled: true,
    }];

    let stats = scheduler.enqueue_scan(&roots).await.expect("enqueue_scan");
    assert_eq!(stats.enqueued, 1);
    assert_eq!(stats.routed, 1);

    scheduler.request_shutdown(true);
    let reason = tokio::time::timeout(std::time::Duration::from_secs(10), scheduler.run())
        .await
        .expect("run finishes before the test timeout")
        .expect("run does not hard-fail");
    assert_eq!(reason, StopReason::Drained);

    let counts = scheduler.queue_counts();
    assert_eq!(counts.pending, 0);
    assert_eq!(counts.processing, 0);
    assert_eq!(counts.done, 1);
}

#[tokio::test]
async fn disabled_roots_are_never_scanned() {
    let (scheduler, _storage, sources) = fixture_scheduler().await;

    let root_dir = sources.path().join("mod-b");
    std::fs::create_dir_all(root_dir.join("common/traits")).expect("mkdir");
    std::fs::write(root_dir.join("common/traits/00_traits.txt"), "trait_x = {}").expect("write fixture");

    let roots = vec![PlaysetRoot {
        content_version_id: ContentVersionId::new("mod-b@1"),
        root_path: root_dir.to_string_lossy().to_string(),
        enabled: false,
    }];

    let stats = scheduler.enqueue_scan(&roots).await.expect("enqueue_scan");
    assert_eq!(stats.files_seen, 0);
    assert_eq!(stats.enqueued, 0);
}

#[tokio::test]
async fn reset_requeues_items_matching_the_filter() {
    let (scheduler, _storage, sources) = fixture_scheduler().await;

    let root_dir = sources.path().join("mod-c");
    std::fs::create_dir_all(root_dir.join("common/traits")).expect("mkdir");
    std::fs::write(root_dir.join("common/traits/00_traits.txt"), "trait_y = {}").expect("write fixture");
    let roots = vec![PlaysetRoot {
        content_version_id: ContentVersionId::new("mod-c@1"),
        root_path: root_dir.to_string_lossy().to_string(),
        enabled: true,
    }];
    scheduler.enqueue_scan(&roots).await.expect("enqueue_scan");

    let count = scheduler.reset(&qb_queue::ResetFilter::default()).expect("reset");
    assert_eq!(count, 1, "the single pending item matches an empty filter");
}

#[tokio::test]
async fn complete_run_persists_status_and_checkpoints() {
    let (scheduler, _storage, _sources) = fixture_scheduler().await;

    scheduler.complete_run(BuildRunStatus::Completed).expect("complete_run");

    let state = scheduler.store.state();
    let run = state.build_runs.get(&scheduler.run_id).expect("run recorded");
    assert_eq!(run.status, BuildRunStatus::Completed);
    assert!(run.completed_at.is_some());
}

#[tokio::test]
async fn run_parks_until_shutdown_is_requested_on_an_empty_queue() {
    let (scheduler, _storage, _sources) = fixture_scheduler().await;

    let run_scheduler = Arc::clone(&scheduler);
    let handle = tokio::spawn(async move { run_scheduler.run().await });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!handle.is_finished(), "an empty queue with no shutdown request keeps polling");

    scheduler.request_shutdown(true);
    let reason = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("task completes after shutdown is requested")
        .expect("task does not panic")
        .expect("run does not hard-fail");
    assert_eq!(reason, StopReason::Drained);
}
