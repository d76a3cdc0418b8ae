// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic path resolution for the pipeline-data tree.
//!
//! Pure functions only; the resolver never touches the filesystem.
//!
//! ```text
//! {dataRoot}/pipeline-data/
//!   pending/{jobId}-seed.json
//!   rejected/{jobId}-seed.json + {jobId}-seed.reason
//!   current/{jobId}/...
//!   complete/{jobId}/... + runs.jsonl
//! ```

use relay_core::{Bucket, FileKind};
use std::path::{Path, PathBuf};

/// Resolves every path the orchestrator reads or writes under one data
/// root. Individual directories can be redirected (the runner honors
/// env overrides for the data dir and the current/complete buckets).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
    pipeline_data: PathBuf,
    current_override: Option<PathBuf>,
    complete_override: Option<PathBuf>,
}

impl DataPaths {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        let root = data_root.into();
        let pipeline_data = root.join("pipeline-data");
        Self {
            root,
            pipeline_data,
            current_override: None,
            complete_override: None,
        }
    }

    /// Redirect the pipeline-data directory away from the root.
    pub fn with_pipeline_data(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pipeline_data = dir.into();
        self
    }

    /// Redirect the current bucket.
    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_override = Some(dir.into());
        self
    }

    /// Redirect the complete bucket.
    pub fn with_complete_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.complete_override = Some(dir.into());
        self
    }

    pub fn data_root(&self) -> &Path {
        &self.root
    }

    /// The pipeline-data directory holding the four buckets.
    pub fn pipeline_data(&self) -> PathBuf {
        self.pipeline_data.clone()
    }

    /// A bucket directory.
    pub fn bucket(&self, bucket: Bucket) -> PathBuf {
        match bucket {
            Bucket::Current => {
                if let Some(dir) = &self.current_override {
                    return dir.clone();
                }
            }
            Bucket::Complete => {
                if let Some(dir) = &self.complete_override {
                    return dir.clone();
                }
            }
            _ => {}
        }
        self.pipeline_data.join(bucket.dir_name())
    }

    /// A job's seed file. Pending and rejected store flat
    /// `{jobId}-seed.json` files; current and complete store `seed.json`
    /// inside the job directory.
    pub fn seed(&self, bucket: Bucket, job_id: &str) -> PathBuf {
        if bucket.is_flat() {
            self.bucket(bucket).join(format!("{job_id}-seed.json"))
        } else {
            self.job_dir(bucket, job_id).join("seed.json")
        }
    }

    /// Sibling reason file for a rejected seed.
    pub fn rejection_reason(&self, job_id: &str) -> PathBuf {
        self.bucket(Bucket::Rejected)
            .join(format!("{job_id}-seed.reason"))
    }

    /// A job's directory inside a non-flat bucket.
    pub fn job_dir(&self, bucket: Bucket, job_id: &str) -> PathBuf {
        self.bucket(bucket).join(job_id)
    }

    /// The job's status document.
    pub fn status(&self, bucket: Bucket, job_id: &str) -> PathBuf {
        self.job_dir(bucket, job_id).join("tasks-status.json")
    }

    /// A task's private directory.
    pub fn task_dir(&self, bucket: Bucket, job_id: &str, task: &str) -> PathBuf {
        self.job_dir(bucket, job_id).join("tasks").join(task)
    }

    /// One of the job's shared output directories.
    pub fn files_dir(&self, bucket: Bucket, job_id: &str, kind: FileKind) -> PathBuf {
        self.job_dir(bucket, job_id)
            .join("files")
            .join(kind.dir_name())
    }

    /// The append-only run journal in the complete bucket.
    pub fn runs_journal(&self) -> PathBuf {
        self.bucket(Bucket::Complete).join("runs.jsonl")
    }
}

/// Well-known file names inside a job directory.
pub mod job_files {
    pub const SEED: &str = "seed.json";
    pub const PIPELINE: &str = "pipeline.json";
    pub const JOB_META: &str = "job.json";
    pub const STATUS: &str = "tasks-status.json";
    pub const RUNNER_PID: &str = "runner.pid";
    pub const TASK_OUTPUT: &str = "output.json";
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
