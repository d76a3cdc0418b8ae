// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner supervision.
//!
//! The lifecycle manager forks one `relay-runner` per promoted job and
//! does not block on it. Children are tracked so `--once` mode can drain
//! them; concurrency is bounded by a global semaphore. On a non-zero
//! exit with the job still in current, the outcome is recorded — and if
//! the status document still claims the job is running (a runner crash),
//! the job is marked failed so it does not read as live forever.

use crate::lifecycle::{Config, DaemonError};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use relay_core::{Bucket, JobState, TaskState};
use relay_storage::{load_status, DataPaths, StatusWriter};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Spawns and tracks runner subprocesses.
pub struct Supervisor {
    config: Config,
    runner_bin: PathBuf,
    writer: StatusWriter,
    slots: Arc<Semaphore>,
    children: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl Supervisor {
    pub fn new(config: Config, runner_bin: PathBuf, writer: StatusWriter) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_runners));
        Self {
            config,
            runner_bin,
            writer,
            slots,
            children: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Fork the pipeline runner for a job. Returns immediately; the
    /// child is awaited on a background task. Blocks only while the
    /// global runner cap is saturated.
    pub async fn spawn_runner(&self, job_id: &str) -> Result<(), DaemonError> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| DaemonError::Io(std::io::Error::other("runner slots closed")))?;

        let mut command = Command::new(&self.runner_bin);
        command
            .arg(job_id)
            .env("RELAY_DATA_ROOT", &self.config.data_root)
            .env("RELAY_CONFIG_DIR", &self.config.config_dir)
            .env("RELAY_TASK_REGISTRY", &self.config.registry_path)
            .env("RELAY_LOG_DIR", &self.config.logs_dir);

        let mut child = command.spawn().map_err(DaemonError::Io)?;
        info!(job_id, runner = %self.runner_bin.display(), "runner spawned");

        let job_id = job_id.to_string();
        let paths = self.config.paths.clone();
        let writer = self.writer.clone();
        let handle = tokio::spawn(async move {
            let status = child.wait().await;
            drop(permit);
            match status {
                Ok(status) if status.success() => {
                    info!(job_id, "runner exited cleanly");
                }
                Ok(status) => {
                    warn!(job_id, %status, "runner exited non-zero");
                    record_crash_if_needed(&paths, &writer, &job_id, status.code()).await;
                }
                Err(e) => {
                    error!(job_id, error = %e, "runner wait failed");
                }
            }
        });
        self.children.lock().push(handle);
        Ok(())
    }

    /// Await every tracked child (used by `--once` mode and shutdown).
    pub async fn wait_all(&self) {
        let children: Vec<_> = {
            let mut guard = self.children.lock();
            guard.drain(..).collect()
        };
        for child in children {
            let _ = child.await;
        }
    }

    /// Deliver the stop signal to a job's runner via its PID file. The
    /// runner's own cleanup handlers unlink the PID file and leave state
    /// consistent.
    pub fn stop_job(&self, job_id: &str) -> Result<i32, DaemonError> {
        signal_runner(&self.config.paths, job_id)
    }
}

/// Read `{jobDir}/runner.pid` and send SIGTERM to the recorded process.
/// Returns the signaled PID.
pub fn signal_runner(paths: &DataPaths, job_id: &str) -> Result<i32, DaemonError> {
    let pid_path = paths.job_dir(Bucket::Current, job_id).join("runner.pid");
    let content = std::fs::read_to_string(&pid_path)
        .map_err(|_| DaemonError::NoPidFile(job_id.to_string()))?;
    let pid: i32 = content
        .trim()
        .parse()
        .map_err(|_| DaemonError::BadPidFile(job_id.to_string()))?;

    kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(|e| DaemonError::SignalFailed {
        pid,
        message: e.to_string(),
    })?;
    info!(job_id, pid, "stop signal delivered");
    Ok(pid)
}

/// If a runner died while its status document still claims `running`,
/// mark the running task (and thereby the job) failed.
async fn record_crash_if_needed(
    paths: &DataPaths,
    writer: &StatusWriter,
    job_id: &str,
    exit_code: Option<i32>,
) {
    let job_dir = paths.job_dir(Bucket::Current, job_id);
    if !job_dir.is_dir() {
        return;
    }
    let Ok(doc) = load_status(&job_dir.join("tasks-status.json"), job_id, "") else {
        return;
    };
    if doc.state != JobState::Running {
        return;
    }
    let Some(task_name) = doc.current.clone() else {
        return;
    };

    warn!(job_id, task = %task_name, "runner crashed mid-task, marking failed");
    let error = serde_json::json!(format!(
        "runner exited unexpectedly (code {})",
        exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string())
    ));
    let result = writer
        .update_task(&job_dir, &task_name, move |t| {
            if t.state == TaskState::Running {
                t.state = TaskState::Failed;
                t.error = Some(error);
                t.current_stage = None;
            }
        })
        .await;
    if let Err(e) = result {
        error!(job_id, error = %e, "failed to record runner crash");
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
