// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lazy, memoized parser version probe. A prior regression had a version
//! probe (`git rev-parse HEAD`) running at import time; this evaluates it
//! once, on first demand, off the hot path, with a hard timeout and an
//! `"unknown"` fallback — never at process startup.

use std::sync::mpsc;
use std::sync::OnceLock;
use std::time::Duration;

static VERSION: OnceLock<String> = OnceLock::new();

/// The worker binary's version string, computed at most once per process
/// lifetime. Never invoked at module load; only the first request that
/// needs it pays the cost.
pub fn parser_version() -> &'static str {
    VERSION.get_or_init(probe)
}

fn probe() -> String {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let output = std::process::Command::new("git")
            .args(["rev-parse", "--short", "HEAD"])
            .output();
        let _ = tx.send(output);
    });

    match rx.recv_timeout(Duration::from_secs(5)) {
        Ok(Ok(output)) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        _ => "unknown".to_string(),
    }
}
