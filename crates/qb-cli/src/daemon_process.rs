// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Locating and spawning `qbuilderd`: a debug-build manifest lookup, then
//! a binary next to the running CLI, then a bare `PATH` lookup.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use crate::client::ClientError;

/// Locate the `qbuilderd` binary: `QBUILDER_DAEMON_PATH` env override, else
/// a sibling of the running `qbuilder` binary, else bare `PATH` lookup.
pub fn find_daemon_binary() -> PathBuf {
    if let Ok(path) = std::env::var("QBUILDER_DAEMON_PATH") {
        return PathBuf::from(path);
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join(if cfg!(windows) { "qbuilderd.exe" } else { "qbuilderd" });
            if sibling.exists() {
                return sibling;
            }
        }
    }

    PathBuf::from(if cfg!(windows) { "qbuilderd.exe" } else { "qbuilderd" })
}

/// Spawn `qbuilderd` detached from this process's stdio (`daemon`).
pub fn spawn_background(fresh: bool) -> Result<Child, ClientError> {
    let mut command = Command::new(find_daemon_binary());
    if fresh {
        command.arg("--fresh");
    }
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ClientError::DaemonStartFailed(e.to_string()))
}

/// Run `qbuilderd` in the foreground, inheriting this process's stdio, and
/// block until it exits (`run`).
pub fn run_foreground(fresh: bool) -> Result<std::process::ExitStatus, ClientError> {
    let mut command = Command::new(find_daemon_binary());
    if fresh {
        command.arg("--fresh");
    }
    command.status().map_err(ClientError::Io)
}

#[cfg(test)]
#[path = "daemon_process_tests.rs"]
mod tests;
