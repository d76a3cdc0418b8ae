// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task-descriptor registry.
//!
//! Maps task names to the executables that implement them. The runner
//! resolves each pipeline task through the registry and spawns the
//! described binary as a stage co-process. Resolution failures report
//! every attempted lookup in a single combined error so operators see
//! the whole search at once.

use crate::error::ManifestError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How to invoke one task's implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Executable path. Relative paths resolve against the registry
    /// file's directory.
    pub binary: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: IndexMap<String, String>,
}

/// The loaded registry plus its source path (for error reporting and
/// relative-path resolution).
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    tasks: IndexMap<String, TaskDescriptor>,
    source: PathBuf,
}

impl TaskRegistry {
    /// Load the registry from a JSON file of `{taskName: descriptor}`.
    pub fn load(path: &Path) -> Result<TaskRegistry, ManifestError> {
        let bytes = std::fs::read(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let tasks: IndexMap<String, TaskDescriptor> =
            serde_json::from_slice(&bytes).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(TaskRegistry {
            tasks,
            source: path.to_path_buf(),
        })
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn from_entries(
        source: impl Into<PathBuf>,
        entries: impl IntoIterator<Item = (String, TaskDescriptor)>,
    ) -> TaskRegistry {
        TaskRegistry {
            tasks: entries.into_iter().collect(),
            source: source.into(),
        }
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn contains(&self, task: &str) -> bool {
        self.tasks.contains_key(task)
    }

    /// Resolve a task to an invocable descriptor with an absolute binary
    /// path. Every failed step of the search is recorded; the combined
    /// error enumerates all of them.
    pub fn resolve(&self, task: &str) -> Result<ResolvedTask, ManifestError> {
        let mut attempts = Vec::new();

        let Some(descriptor) = self.tasks.get(task) else {
            attempts.push(format!(
                "no entry for {task:?} in registry {}",
                self.source.display()
            ));
            return Err(ManifestError::TaskResolution {
                task: task.to_string(),
                attempts,
            });
        };

        let binary = if descriptor.binary.is_absolute() {
            descriptor.binary.clone()
        } else {
            let base = self.source.parent().unwrap_or_else(|| Path::new("."));
            base.join(&descriptor.binary)
        };

        if !binary.exists() {
            attempts.push(format!("binary {} does not exist", binary.display()));
            return Err(ManifestError::TaskResolution {
                task: task.to_string(),
                attempts,
            });
        }
        if !binary.is_file() {
            attempts.push(format!("binary {} is not a regular file", binary.display()));
            return Err(ManifestError::TaskResolution {
                task: task.to_string(),
                attempts,
            });
        }

        Ok(ResolvedTask {
            name: task.to_string(),
            binary,
            args: descriptor.args.clone(),
            env: descriptor.env.clone(),
        })
    }
}

/// A registry entry resolved to an absolute, existing binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTask {
    pub name: String,
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub env: IndexMap<String, String>,
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
