// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration, lockfile, and startup/shutdown plumbing.

use crate::env;
use fs2::FileExt;
use relay_core::Bucket;
use relay_storage::DataPaths;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// Daemon errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("could not determine data root (set RELAY_DATA_ROOT or HOME)")]
    NoDataRoot,
    #[error("failed to acquire lock: lifecycle manager already running?")]
    LockFailed(#[source] std::io::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Manifest(#[from] relay_manifest::ManifestError),
    #[error(transparent)]
    Atomic(#[from] relay_storage::AtomicWriteError),
    #[error(transparent)]
    Status(#[from] relay_storage::StatusIoError),
    #[error("no runner.pid for job {0}")]
    NoPidFile(String),
    #[error("invalid runner.pid for job {0}")]
    BadPidFile(String),
    #[error("failed to signal runner pid {pid}: {message}")]
    SignalFailed { pid: i32, message: String },
}

/// Daemon configuration, resolved from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory.
    pub data_root: PathBuf,
    /// Path resolver for the pipeline-data tree.
    pub paths: DataPaths,
    /// Directory of pipeline definitions and the task registry.
    pub config_dir: PathBuf,
    /// Task registry file.
    pub registry_path: PathBuf,
    /// Root-level lock/PID file.
    pub lock_path: PathBuf,
    /// Daemon log file.
    pub log_path: PathBuf,
    /// Per-job runner log directory.
    pub logs_dir: PathBuf,
    /// Global cap on concurrent runners.
    pub max_runners: usize,
}

impl Config {
    /// Load configuration for one data root.
    pub fn load() -> Result<Self, DaemonError> {
        let data_root = env::data_root().ok_or(DaemonError::NoDataRoot)?;
        let paths = env::data_paths(&data_root);
        let config_dir = env::config_dir(&data_root);
        let registry_path = env::registry_path(&config_dir);

        Ok(Self {
            lock_path: data_root.join("relayd.lock"),
            log_path: data_root.join("relayd.log"),
            logs_dir: data_root.join("logs"),
            max_runners: env::max_runners(),
            data_root,
            paths,
            config_dir,
            registry_path,
        })
    }

    /// Create the bucket directories and the logs directory.
    pub fn create_directories(&self) -> Result<(), DaemonError> {
        for bucket in Bucket::ALL {
            std::fs::create_dir_all(self.paths.bucket(bucket))?;
        }
        std::fs::create_dir_all(&self.logs_dir)?;
        Ok(())
    }
}

/// Acquire the root-level exclusive lock and record our PID in it.
///
/// The returned file must be kept alive for the daemon's lifetime; the
/// lock releases on drop. Only one lifecycle manager may run per data
/// root.
pub fn acquire_lock(config: &Config) -> Result<File, DaemonError> {
    if let Some(parent) = config.lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // Open without truncating so a failed acquisition does not wipe the
    // running daemon's PID.
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(DaemonError::LockFailed)?;

    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    info!(path = %config.lock_path.display(), "lifecycle manager lock acquired");
    Ok(lock_file)
}

/// Remove the lock file on orderly shutdown (the lock itself releases
/// when the file handle drops).
pub fn remove_lock(config: &Config) {
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
