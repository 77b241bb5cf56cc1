// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `qbuilder` — a thin launcher over `qbuilderd`'s control protocol:
//! just enough surface to start, drive, and stop the daemon. The CLI
//! argument surface itself is out of scope beyond these commands.

mod client;
mod daemon_process;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qb_daemon::Config;

#[derive(Parser)]
#[command(name = "qbuilder", version, about = "Launcher for the qbuilderd build daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start qbuilderd in the background
    Daemon {
        /// Truncate the existing index before starting
        #[arg(long)]
        fresh: bool,
    },
    /// Run qbuilderd in the foreground, blocking until it exits
    Run {
        /// Truncate the existing index before starting
        #[arg(long)]
        fresh: bool,
    },
    /// Query the running daemon's queue counts and current build run
    Status,
    /// Reset queue items back to pending
    Reset {
        /// Only reset items with this status (pending|processing|done|error)
        #[arg(long)]
        status: Option<String>,
        /// Only reset items routed to this envelope (e.g. SCRIPT_FULL)
        #[arg(long)]
        envelope: Option<String>,
        /// Only reset items from this content version
        #[arg(long = "content-version")]
        content_version: Option<String>,
    },
    /// Request daemon shutdown
    Stop {
        /// Abort immediately instead of draining in-flight work
        #[arg(long)]
        abort: bool,
    },
    /// Trigger a discovery pass over a JSON-encoded list of playset roots
    EnqueueScan {
        /// Path to a JSON file containing a `Vec<PlaysetRoot>`
        roots: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Daemon { fresh } => {
            let config = Config::load().context("loading qbuilderd configuration")?;
            daemon_process::spawn_background(fresh).context("starting qbuilderd")?;
            run_async(client::wait_until_reachable(config.control_addr(), client::connect_timeout()))?
                .context("waiting for qbuilderd to become ready")?;
            println!("qbuilderd started on {}", config.control_addr());
            Ok(())
        }
        Command::Run { fresh } => {
            let status = daemon_process::run_foreground(fresh).context("running qbuilderd in the foreground")?;
            std::process::exit(status.code().unwrap_or(1));
        }
        Command::Status => {
            let result = call("status", serde_json::Value::Null)?;
            print_json(&result);
            Ok(())
        }
        Command::Reset { status, envelope, content_version } => {
            let filter = serde_json::json!({
                "status": status,
                "envelope": envelope,
                "content_version_id": content_version,
            });
            let result = call("reset", serde_json::json!({ "filter": filter }))?;
            print_json(&result);
            Ok(())
        }
        Command::Stop { abort } => {
            let result = call("shutdown", serde_json::json!({ "graceful": !abort }))?;
            print_json(&result);
            Ok(())
        }
        Command::EnqueueScan { roots } => {
            let text = std::fs::read_to_string(&roots).with_context(|| format!("reading {}", roots.display()))?;
            let roots: serde_json::Value = serde_json::from_str(&text).context("parsing playset roots file")?;
            let result = call("enqueue_scan", serde_json::json!({ "roots": roots }))?;
            print_json(&result);
            Ok(())
        }
    }
}

fn call(method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let config = Config::load().context("loading qbuilderd configuration")?;
    run_async(client::call(config.control_addr(), method, params))?
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}

fn run_async<F: std::future::Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting a single-threaded tokio runtime")?;
    Ok(runtime.block_on(future))
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
