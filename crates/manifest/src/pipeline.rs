// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline definitions.
//!
//! A pipeline is an ordered, named list of task identifiers plus optional
//! per-task configuration. Definitions live in the registry as
//! `{configDir}/pipelines/{slug}.json` and are snapshotted into the job
//! directory at promotion time so later registry edits cannot mutate an
//! in-flight job.

use crate::error::ManifestError;
use indexmap::IndexMap;
use relay_core::JobId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Default bound on the validation→refinement back-edge.
pub const DEFAULT_MAX_REFINEMENT_ATTEMPTS: u32 = 2;

/// A pipeline definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDef {
    pub name: String,
    /// Ordered task identifiers; tasks execute strictly in this order.
    pub tasks: Vec<String>,
    /// Optional per-task configuration, keyed by task name.
    #[serde(
        default,
        rename = "taskConfig",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub task_config: IndexMap<String, Value>,
}

impl PipelineDef {
    /// Load and validate a definition from a JSON file.
    pub fn load(path: &Path) -> Result<PipelineDef, ManifestError> {
        let bytes = std::fs::read(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let def: PipelineDef =
            serde_json::from_slice(&bytes).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        def.validate()?;
        Ok(def)
    }

    /// Load a definition from the registry by slug.
    pub fn load_from_registry(config_dir: &Path, slug: &str) -> Result<PipelineDef, ManifestError> {
        let path = registry_pipeline_path(config_dir, slug);
        if !path.exists() {
            return Err(ManifestError::UnknownPipeline(slug.to_string()));
        }
        PipelineDef::load(&path)
    }

    /// Structural validation: non-empty name and task list, task names
    /// filesystem-safe and unique, config keys referencing known tasks.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let invalid = |msg: String| Err(ManifestError::InvalidPipeline(msg));

        if self.name.is_empty() {
            return invalid("name is empty".into());
        }
        if self.tasks.is_empty() {
            return invalid("tasks is empty".into());
        }
        for task in &self.tasks {
            if JobId::check(task).is_err() {
                return invalid(format!("task name {task:?} is not filesystem-safe"));
            }
        }
        for (ix, task) in self.tasks.iter().enumerate() {
            if self.tasks[..ix].contains(task) {
                return invalid(format!("duplicate task {task:?}"));
            }
        }
        for key in self.task_config.keys() {
            if !self.tasks.contains(key) {
                return invalid(format!("taskConfig references unknown task {key:?}"));
            }
        }
        Ok(())
    }

    /// Per-task configuration object, if present.
    pub fn config_for(&self, task: &str) -> Option<&Value> {
        self.task_config.get(task)
    }

    /// Typed tuning knobs extracted from a task's configuration.
    pub fn tuning_for(&self, task: &str) -> TaskTuning {
        TaskTuning::from_config(self.config_for(task))
    }

    /// Position of a task in pipeline order.
    pub fn position(&self, task: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t == task)
    }

    /// Content hash of the canonical JSON rendering, recorded in
    /// `job.json` so a snapshot can be matched to its registry source.
    pub fn content_hash(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        format!("{:x}", hasher.finalize())
    }
}

/// Tuning knobs the stage runner reads from per-task configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTuning {
    pub max_refinement_attempts: u32,
    pub stage_timeout_ms: Option<u64>,
}

impl Default for TaskTuning {
    fn default() -> Self {
        Self {
            max_refinement_attempts: DEFAULT_MAX_REFINEMENT_ATTEMPTS,
            stage_timeout_ms: None,
        }
    }
}

impl TaskTuning {
    fn from_config(config: Option<&Value>) -> TaskTuning {
        let mut tuning = TaskTuning::default();
        let Some(config) = config else {
            return tuning;
        };
        if let Some(max) = config.get("maxRefinementAttempts").and_then(Value::as_u64) {
            tuning.max_refinement_attempts = max as u32;
        }
        if let Some(ms) = config.get("stageTimeoutMs").and_then(Value::as_u64) {
            tuning.stage_timeout_ms = Some(ms);
        }
        tuning
    }
}

/// Path of a pipeline definition inside the registry.
pub fn registry_pipeline_path(config_dir: &Path, slug: &str) -> PathBuf {
    config_dir.join("pipelines").join(format!("{slug}.json"))
}

/// Whether a pipeline slug exists in the registry.
pub fn pipeline_exists(config_dir: &Path, slug: &str) -> bool {
    registry_pipeline_path(config_dir, slug).is_file()
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
