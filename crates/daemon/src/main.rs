// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! relayd — the Relay job lifecycle manager.
//!
//! Watches the pending bucket, promotes seeds, spawns pipeline runners,
//! and supervises them. One instance per data root, enforced by a
//! root-level lockfile.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use relay_core::{Bucket, EventSink, SystemClock};
use relay_daemon::bus::EventBus;
use relay_daemon::env;
use relay_daemon::intake::{Intake, IntakeOutcome};
use relay_daemon::lifecycle::{self, Config, DaemonError};
use relay_daemon::supervisor::Supervisor;
use relay_storage::{list_jobs, StatusWriter};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut once = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--once" => once = true,
            "--version" | "-V" => {
                println!("relayd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("Usage: relayd [--once | --help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;

    rotate_log_if_needed(&config.log_path);
    write_startup_marker(&config)?;
    let _log_guard = setup_logging(&config)?;

    info!("starting lifecycle manager");

    // Lock first: one manager per data root.
    let lock_file = match lifecycle::acquire_lock(&config) {
        Ok(file) => file,
        Err(DaemonError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&config.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("relayd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            write_startup_error(&config, &e);
            error!("failed to start: {e}");
            return Err(e.into());
        }
    };

    config.create_directories()?;

    let bus = Arc::new(EventBus::default());
    let writer = StatusWriter::system(bus.clone() as Arc<dyn EventSink>);
    let intake = Intake::new(
        config.clone(),
        bus.clone() as Arc<dyn EventSink>,
        Arc::new(SystemClock),
    );
    let supervisor = Supervisor::new(config.clone(), env::runner_bin(), writer);

    let orphaned = list_jobs(&config.paths, Bucket::Current);
    if !orphaned.is_empty() {
        info!(count = orphaned.len(), "jobs already in current at startup");
    }

    if once {
        drain_and_spawn(&intake, &supervisor).await;
        supervisor.wait_all().await;
        lifecycle::remove_lock(&config);
        drop(lock_file);
        info!("single pass complete");
        return Ok(());
    }

    // Filesystem watcher on the pending bucket, with an interval rescan
    // as the fallback for missed events.
    let (wake_tx, mut wake_rx) = mpsc::unbounded_channel::<()>();
    let _watcher = spawn_pending_watcher(&config, wake_tx);

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut rescan = tokio::time::interval(Duration::from_millis(env::scan_interval_ms()));

    info!(
        pending = %config.paths.bucket(Bucket::Pending).display(),
        "lifecycle manager ready"
    );
    println!("READY");

    loop {
        tokio::select! {
            _ = wake_rx.recv() => drain_and_spawn(&intake, &supervisor).await,
            _ = rescan.tick() => drain_and_spawn(&intake, &supervisor).await,
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
        }
    }

    // Runners are left to finish on their own; stop signals target them
    // individually via their PID files.
    lifecycle::remove_lock(&config);
    drop(lock_file);
    info!("lifecycle manager stopped");
    Ok(())
}

/// One intake pass: promote or reject every waiting seed, then fork a
/// runner per promoted job.
async fn drain_and_spawn(intake: &Intake, supervisor: &Supervisor) {
    for outcome in intake.drain_pending() {
        if let IntakeOutcome::Promoted { job_id } = outcome {
            if let Err(e) = supervisor.spawn_runner(&job_id).await {
                error!(job_id, error = %e, "runner spawn failed");
            }
        }
    }
}

/// Watch the pending bucket for seed creation/modification.
fn spawn_pending_watcher(
    config: &Config,
    wake_tx: mpsc::UnboundedSender<()>,
) -> Option<notify::RecommendedWatcher> {
    use notify::{RecursiveMode, Watcher};

    let pending = config.paths.bucket(Bucket::Pending);
    let mut watcher = match notify::recommended_watcher(move |result| {
        if let Ok(notify::Event { kind, .. }) = result {
            if matches!(
                kind,
                notify::EventKind::Create(_) | notify::EventKind::Modify(_)
            ) {
                let _ = wake_tx.send(());
            }
        }
    }) {
        Ok(watcher) => watcher,
        Err(e) => {
            warn!(error = %e, "pending watcher unavailable, relying on rescan interval");
            return None;
        }
    };

    if let Err(e) = watcher.watch(&pending, RecursiveMode::NonRecursive) {
        warn!(error = %e, "pending watch failed, relying on rescan interval");
        return None;
    }
    Some(watcher)
}

fn print_help() {
    println!("relayd {}", env!("CARGO_PKG_VERSION"));
    println!("Relay lifecycle manager - watches the pending bucket and runs pipeline jobs");
    println!();
    println!("USAGE:");
    println!("    relayd [--once]");
    println!();
    println!("OPTIONS:");
    println!("    --once           Process waiting seeds, run their jobs to completion, exit");
    println!("    -h, --help       Print help information");
    println!("    -V, --version    Print version information");
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep.
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log at startup if it has grown too large.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let _ = std::fs::rename(format!("{log_str}.{i}"), format!("{log_str}.{}", i + 1));
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Startup marker written before tracing comes up, so operators can find
/// where the current attempt begins in the log.
fn write_startup_marker(config: &Config) -> Result<(), DaemonError> {
    use std::io::Write;
    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "--- relayd: starting (pid: {}) ---\n", std::process::id())?;
    Ok(())
}

/// Write a startup error synchronously so it is visible even if the
/// process exits before the non-blocking writer flushes.
fn write_startup_error(config: &Config, error: &DaemonError) {
    use std::io::Write;
    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start lifecycle manager: {error}");
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, DaemonError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let parent = config.log_path.parent().ok_or(DaemonError::NoDataRoot)?;
    std::fs::create_dir_all(parent)?;
    let file_name = config
        .log_path
        .file_name()
        .ok_or(DaemonError::NoDataRoot)?;

    let file_appender = tracing_appender::rolling::never(parent, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(env::log_level()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
