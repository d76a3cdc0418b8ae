// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! relay-runner — the per-job pipeline runner.
//!
//! Spawned by `relayd` (or an operator) with the job id as its only
//! required argument; all other inputs arrive through the environment.
//! Writes `runner.pid` into the job directory at startup and removes it
//! on every termination path: synchronously on signals, asynchronously
//! on orderly exits.
//!
//! Exit codes: 0 success, 1 task failure, 130 interrupt, 143 terminate.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use relay_core::{Bucket, NoopSink, SystemClock};
use relay_daemon::env;
use relay_engine::runner::{remove_pid_file, run_job, write_pid_file, RunOutcome, RunnerConfig};
use relay_engine::{ProcessExecutorFactory, RunnerDeps};
use relay_storage::StatusWriter;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

const EXIT_TASK_FAILED: i32 = 1;
const EXIT_INTERRUPT: i32 = 130;
const EXIT_TERMINATE: i32 = 143;

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let job_id = match args.next() {
        Some(arg) if arg == "--help" || arg == "-h" => {
            println!("Usage: relay-runner <jobId>");
            println!("Runs every task of one job; configuration comes from RELAY_* env vars.");
            return;
        }
        Some(arg) if arg == "--version" || arg == "-V" => {
            println!("relay-runner {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        Some(job_id) => job_id,
        None => {
            eprintln!("error: missing job id");
            eprintln!("Usage: relay-runner <jobId>");
            std::process::exit(2);
        }
    };

    let config = match runner_config(&job_id) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("error: {message}");
            std::process::exit(2);
        }
    };

    let _log_guard = setup_logging(&job_id);

    let job_dir = config.paths.job_dir(Bucket::Current, &job_id);
    if let Err(e) = write_pid_file(&job_dir) {
        eprintln!("error: cannot write runner.pid: {e}");
        std::process::exit(2);
    }

    let extra_env = vec![
        ("RELAY_JOB_ID".to_string(), job_id.clone()),
        (
            "RELAY_DATA_ROOT".to_string(),
            config.paths.data_root().display().to_string(),
        ),
    ];
    let deps = RunnerDeps {
        factory: ProcessExecutorFactory::new(extra_env),
        writer: StatusWriter::system(Arc::new(NoopSink)),
        sink: Arc::new(NoopSink),
        clock: Arc::new(SystemClock),
    };

    // Signals race the run; the PID file is unlinked synchronously on
    // the signal paths before the process dies.
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            remove_pid_file(&job_dir);
            eprintln!("error: signal setup failed: {e}");
            std::process::exit(2);
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            remove_pid_file(&job_dir);
            eprintln!("error: signal setup failed: {e}");
            std::process::exit(2);
        }
    };

    let code = tokio::select! {
        result = run_job(&config, &deps) => {
            let moved = matches!(&result, Ok(RunOutcome::Completed));
            // After archival the job directory (and the PID file inside
            // it) lives in the complete bucket; clean whichever exists.
            if moved {
                remove_pid_file(&config.paths.job_dir(Bucket::Complete, &job_id));
            } else {
                remove_pid_file(&job_dir);
            }
            match result {
                Ok(RunOutcome::Completed) => {
                    info!(job_id, "run complete");
                    0
                }
                Ok(RunOutcome::SingleTask) => {
                    info!(job_id, "single-task run complete");
                    0
                }
                Ok(RunOutcome::Failed { task }) => {
                    error!(job_id, task, "task failed");
                    EXIT_TASK_FAILED
                }
                Err(e) => {
                    error!(job_id, error = %e, "run aborted");
                    eprintln!("error: {e}");
                    EXIT_TASK_FAILED
                }
            }
        }
        _ = sigterm.recv() => {
            info!(job_id, "terminated");
            remove_pid_file(&job_dir);
            EXIT_TERMINATE
        }
        _ = sigint.recv() => {
            info!(job_id, "interrupted");
            remove_pid_file(&job_dir);
            EXIT_INTERRUPT
        }
    };

    std::process::exit(code);
}

/// Assemble the runner configuration from the environment.
fn runner_config(job_id: &str) -> Result<RunnerConfig, String> {
    let data_root = env::data_root().ok_or("RELAY_DATA_ROOT is not set and HOME is unknown")?;
    let paths = env::data_paths(&data_root);
    let config_dir = env::config_dir(&data_root);
    let registry_path = env::registry_path(&config_dir);

    let pipeline_path = std::env::var("RELAY_PIPELINE_PATH").ok().map(PathBuf::from);
    let pipeline_slug = std::env::var("RELAY_PIPELINE_SLUG").ok();
    let start_from_task = std::env::var("RELAY_START_FROM_TASK").ok().filter(|s| !s.is_empty());
    let run_single_task = std::env::var("RELAY_RUN_SINGLE_TASK")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    Ok(RunnerConfig {
        paths,
        job_id: job_id.to_string(),
        pipeline_path,
        config_dir: Some(config_dir),
        pipeline_slug,
        registry_path,
        start_from_task,
        run_single_task,
    })
}

/// Per-job runner log under `{dataRoot}/logs/{jobId}.log` (or
/// RELAY_LOG_DIR when the daemon redirects it).
fn setup_logging(job_id: &str) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = std::env::var("RELAY_LOG_DIR")
        .map(PathBuf::from)
        .ok()
        .or_else(|| env::data_root().map(|root| root.join("logs")))?;
    std::fs::create_dir_all(&log_dir).ok()?;

    let file_appender = tracing_appender::rolling::never(&log_dir, format!("{job_id}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(env::log_level()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Some(guard)
}
