use tempfile::tempdir;

use super::*;

fn test_config(storage_root: std::path::PathBuf) -> Config {
    Config {
        routing_table_path: storage_root.join("routing.hcl"),
        playset_path: storage_root.join("playset.json"),
        workerd_path: storage_root.join("qb-workerd"),
        logs_dir: storage_root.join("logs"),
        daemon_log_path: storage_root.join("daemon.log"),
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
        storage_root,
    }
}

#[test]
fn load_initial_playset_is_none_when_the_file_is_absent() {
    let storage = tempdir().expect("tempdir");
    let config = test_config(storage.path().to_path_buf());
    assert!(load_initial_playset(&config).is_none());
}

#[test]
fn load_initial_playset_parses_a_valid_roots_file() {
    let storage = tempdir().expect("tempdir");
    let config = test_config(storage.path().to_path_buf());
    std::fs::write(
        &config.playset_path,
        r#"[{"content_version_id": "vanilla@1.0", "root_path": "/mods/vanilla", "enabled": true}]"#,
    )
    .expect("write playset file");

    let roots = load_initial_playset(&config).expect("some roots");
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].root_path, "/mods/vanilla");
    assert!(roots[0].enabled);
}

#[test]
fn load_initial_playset_is_none_on_malformed_json() {
    let storage = tempdir().expect("tempdir");
    let config = test_config(storage.path().to_path_buf());
    std::fs::write(&config.playset_path, "not json at all").expect("write playset file");

    assert!(load_initial_playset(&config).is_none());
}

#[test]
fn open_store_creates_a_fresh_index_on_first_start() {
    let storage = tempdir().expect("tempdir");
    let config = test_config(storage.path().to_path_buf());
    let store = open_store(&config, false).expect("opens a missing storage root");
    assert_eq!(store.state().queue_items.len(), 0);
}

#[test]
fn open_store_fresh_truncates_prior_state() {
    let storage = tempdir().expect("tempdir");
    let config = test_config(storage.path().to_path_buf());

    {
        let store = open_store(&config, false).expect("first open");
        store
            .apply(qb_core::Event::BuildRunStarted {
                run_id: qb_core::RunId::new("stale-run"),
                started_at: chrono::Utc::now(),
                trigger: "start".to_string(),
                config_snapshot: serde_json::json!({}),
            })
            .expect("apply");
    }

    let reopened = open_store(&config, true).expect("fresh reopen");
    assert!(reopened.state().build_runs.is_empty(), "--fresh discards the prior run");
}
