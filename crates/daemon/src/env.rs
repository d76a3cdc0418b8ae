// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use relay_storage::DataPaths;
use std::path::PathBuf;

/// Resolve the data root: RELAY_DATA_ROOT > XDG_STATE_HOME/relay >
/// ~/.local/state/relay.
pub fn data_root() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("RELAY_DATA_ROOT") {
        return Some(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg).join("relay"));
    }
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local/state/relay"))
}

/// Build the path resolver, honoring the directory overrides the runner
/// environment documents (data dir, current dir, complete dir).
pub fn data_paths(root: &PathBuf) -> DataPaths {
    let mut paths = DataPaths::new(root);
    if let Ok(dir) = std::env::var("RELAY_DATA_DIR") {
        paths = paths.with_pipeline_data(dir);
    }
    if let Ok(dir) = std::env::var("RELAY_CURRENT_DIR") {
        paths = paths.with_current_dir(dir);
    }
    if let Ok(dir) = std::env::var("RELAY_COMPLETE_DIR") {
        paths = paths.with_complete_dir(dir);
    }
    paths
}

/// Configuration directory: RELAY_CONFIG_DIR > {dataRoot}/config.
pub fn config_dir(data_root: &PathBuf) -> PathBuf {
    std::env::var("RELAY_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_root.join("config"))
}

/// Task registry path: RELAY_TASK_REGISTRY > {configDir}/tasks.json.
pub fn registry_path(config_dir: &PathBuf) -> PathBuf {
    std::env::var("RELAY_TASK_REGISTRY")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir.join("tasks.json"))
}

/// Global cap on concurrently running pipeline runners.
pub fn max_runners() -> usize {
    std::env::var("RELAY_MAX_RUNNERS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(4)
}

/// Runner binary: RELAY_RUNNER_BIN > `relay-runner` next to the current
/// executable.
pub fn runner_bin() -> PathBuf {
    if let Ok(bin) = std::env::var("RELAY_RUNNER_BIN") {
        return PathBuf::from(bin);
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("relay-runner")))
        .unwrap_or_else(|| PathBuf::from("relay-runner"))
}

/// Log filter: RELAY_LOG_LEVEL > "info".
pub fn log_level() -> String {
    std::env::var("RELAY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

/// Pending-bucket rescan interval in milliseconds (watcher fallback).
pub fn scan_interval_ms() -> u64 {
    std::env::var("RELAY_SCAN_INTERVAL_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(1000)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
