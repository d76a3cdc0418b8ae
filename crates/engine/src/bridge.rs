// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task symlink bridges.
//!
//! Each task runs cwd'd into its own directory (`tasks/{task}/`) but
//! needs the job's shared `files/` tree reachable from there. The bridge
//! is a relative symlink `tasks/{task}/files → ../../files`; relative so
//! it survives the rename from `current/` to `complete/`. Bridges are
//! validated (and repaired when possible) before each task run, and swept
//! after archival so the archive carries no task-internal links.

use crate::error::EngineError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const BRIDGE_TARGET: &str = "../../files";

/// Path of a task's bridge link.
pub fn bridge_path(job_dir: &Path, task: &str) -> PathBuf {
    job_dir.join("tasks").join(task).join("files")
}

/// Ensure the task directory exists and its bridge is valid, repairing a
/// wrong or dangling link. Returns the task directory.
///
/// Unrecoverable cases (a real file or non-empty directory squatting on
/// the link path) are surfaced as errors; the caller marks the task
/// failed rather than destroy data.
pub fn ensure_bridge(job_dir: &Path, task: &str) -> Result<PathBuf, EngineError> {
    let task_dir = job_dir.join("tasks").join(task);
    fs::create_dir_all(&task_dir).map_err(EngineError::Io)?;
    let link = task_dir.join("files");

    match fs::symlink_metadata(&link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let target = fs::read_link(&link).map_err(EngineError::Io)?;
            if target != Path::new(BRIDGE_TARGET) {
                warn!(task, target = %target.display(), "repairing bridge with wrong target");
                fs::remove_file(&link).map_err(EngineError::Io)?;
                make_link(&link, task)?;
            }
        }
        Ok(meta) if meta.is_dir() => {
            // An empty directory can be swapped for the link; anything
            // else is user data we must not delete.
            let empty = fs::read_dir(&link)
                .map_err(EngineError::Io)?
                .next()
                .is_none();
            if !empty {
                return Err(EngineError::Bridge {
                    task: task.to_string(),
                    message: format!(
                        "{} is a non-empty directory where the files bridge belongs",
                        link.display()
                    ),
                });
            }
            fs::remove_dir(&link).map_err(EngineError::Io)?;
            make_link(&link, task)?;
        }
        Ok(_) => {
            return Err(EngineError::Bridge {
                task: task.to_string(),
                message: format!(
                    "{} is a regular file where the files bridge belongs",
                    link.display()
                ),
            });
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            make_link(&link, task)?;
        }
        Err(e) => return Err(EngineError::Io(e)),
    }

    Ok(task_dir)
}

fn make_link(link: &Path, task: &str) -> Result<(), EngineError> {
    std::os::unix::fs::symlink(BRIDGE_TARGET, link).map_err(|e| EngineError::Bridge {
        task: task.to_string(),
        message: format!("cannot create bridge {}: {e}", link.display()),
    })?;
    debug!(task, link = %link.display(), "bridge created");
    Ok(())
}

/// Remove every task's bridge link under a job directory. Best-effort;
/// used before archival so the archive has no dangling task links.
pub fn sweep_bridges(job_dir: &Path) {
    let tasks_dir = job_dir.join("tasks");
    let Ok(entries) = fs::read_dir(&tasks_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let link = entry.path().join("files");
        if let Ok(meta) = fs::symlink_metadata(&link) {
            if meta.file_type().is_symlink() {
                if let Err(e) = fs::remove_file(&link) {
                    warn!(link = %link.display(), error = %e, "bridge sweep failed");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
