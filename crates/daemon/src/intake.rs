// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seed intake: the pending-bucket half of the lifecycle manager.
//!
//! A submitter drops `{jobId}-seed.json` into the pending bucket. Intake
//! parses and validates it, then either rejects it (moved to the
//! rejected bucket with a sibling `.reason` file) or promotes it: the
//! current-bucket job directory is created, the seed and a snapshot of
//! the pipeline definition are written inside, the status document is
//! initialized with every task pending, upload artifacts are copied in,
//! and the pending seed file is removed.

use crate::lifecycle::{Config, DaemonError};
use relay_core::{BusEvent, Bucket, Clock, EventSink, JobId, StatusDoc};
use relay_manifest::{pipeline_exists, PipelineDef, Seed};
use relay_storage::{atomic_write, save_status, JobMeta};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// The outcome of processing one pending seed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Seed promoted into the current bucket.
    Promoted { job_id: String },
    /// Seed moved to the rejected bucket.
    Rejected { job_id: String, reason: String },
}

/// Validates and promotes pending seeds.
pub struct Intake {
    config: Config,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl Intake {
    pub fn new(config: Config, sink: Arc<dyn EventSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            sink,
            clock,
        }
    }

    /// List seed files currently waiting in the pending bucket.
    pub fn scan_pending(&self) -> Vec<PathBuf> {
        let dir = self.config.paths.bucket(Bucket::Pending);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut seeds: Vec<PathBuf> = entries
            .filter_map(|entry| {
                let path = entry.ok()?.path();
                let name = path.file_name()?.to_str()?;
                (!name.starts_with('.') && name.ends_with("-seed.json")).then_some(path)
            })
            .collect();
        seeds.sort();
        seeds
    }

    /// Process every waiting seed once; returns the outcomes in scan
    /// order.
    pub fn drain_pending(&self) -> Vec<IntakeOutcome> {
        self.scan_pending()
            .into_iter()
            .filter_map(|path| match self.process_seed_file(&path) {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "seed processing failed");
                    None
                }
            })
            .collect()
    }

    /// Validate one pending seed file and promote or reject it.
    pub fn process_seed_file(&self, path: &Path) -> Result<IntakeOutcome, DaemonError> {
        let job_id = self.job_id_for(path);
        let bytes = std::fs::read(path)?;

        let seed = match Seed::from_slice(&bytes) {
            Ok(seed) => seed,
            Err(e) => return self.reject(path, &job_id, &e.to_string()),
        };
        if let Err(e) = seed.check_pipeline(|slug| pipeline_exists(&self.config.config_dir, slug)) {
            return self.reject(path, &job_id, &e.to_string());
        }
        let pipeline = match PipelineDef::load_from_registry(&self.config.config_dir, &seed.pipeline)
        {
            Ok(pipeline) => pipeline,
            Err(e) => return self.reject(path, &job_id, &e.to_string()),
        };

        self.promote(path, &job_id, &seed, &pipeline)?;
        Ok(IntakeOutcome::Promoted { job_id })
    }

    /// Derive the job id from the seed file name, minting one when the
    /// name does not carry a valid id.
    fn job_id_for(&self, path: &Path) -> String {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix("-seed.json"))
            .filter(|stem| JobId::check(stem).is_ok())
            .map(|stem| stem.to_string())
            .unwrap_or_else(|| JobId::mint().to_string())
    }

    fn reject(
        &self,
        path: &Path,
        job_id: &str,
        reason: &str,
    ) -> Result<IntakeOutcome, DaemonError> {
        let rejected_dir = self.config.paths.bucket(Bucket::Rejected);
        std::fs::create_dir_all(&rejected_dir)?;
        let dest = self.config.paths.seed(Bucket::Rejected, job_id);
        std::fs::rename(path, &dest)?;
        atomic_write(
            &self.config.paths.rejection_reason(job_id),
            format!("{reason}\n").as_bytes(),
        )?;
        warn!(job_id, reason, "seed rejected");
        Ok(IntakeOutcome::Rejected {
            job_id: job_id.to_string(),
            reason: reason.to_string(),
        })
    }

    fn promote(
        &self,
        pending_path: &Path,
        job_id: &str,
        seed: &Seed,
        pipeline: &PipelineDef,
    ) -> Result<(), DaemonError> {
        let paths = &self.config.paths;
        let job_dir = paths.job_dir(Bucket::Current, job_id);
        std::fs::create_dir_all(job_dir.join("tasks"))?;
        for kind in relay_core::FileKind::ALL {
            std::fs::create_dir_all(paths.files_dir(Bucket::Current, job_id, kind))?;
        }

        atomic_write(
            &job_dir.join("seed.json"),
            &serde_json::to_vec_pretty(seed).map_err(into_io)?,
        )?;

        // Snapshot the definition so later registry edits cannot mutate
        // an in-flight job.
        atomic_write(
            &job_dir.join("pipeline.json"),
            &serde_json::to_vec_pretty(pipeline).map_err(into_io)?,
        )?;

        let meta = JobMeta {
            id: job_id.to_string(),
            name: seed.name.clone(),
            pipeline: seed.pipeline.clone(),
            created_at: self.clock.iso(),
            pipeline_hash: Some(pipeline.content_hash()),
        };
        atomic_write(
            &job_dir.join("job.json"),
            &serde_json::to_vec_pretty(&meta).map_err(into_io)?,
        )?;

        let mut status = StatusDoc::new(job_id, self.clock.iso());
        for task in &pipeline.tasks {
            status.ensure_task(task);
        }
        status.recompute();
        save_status(&job_dir.join("tasks-status.json"), &status)?;

        self.copy_uploads(pending_path, job_id)?;

        std::fs::remove_file(pending_path)?;

        info!(job_id, pipeline = %pipeline.name, "seed promoted");
        self.sink.publish(BusEvent::SeedUploaded {
            name: seed.name.clone(),
        });
        Ok(())
    }

    /// Copy upload artifacts from an optional `{jobId}-seed-files/`
    /// sibling directory into the job's artifacts tree.
    fn copy_uploads(&self, pending_path: &Path, job_id: &str) -> Result<(), DaemonError> {
        let Some(stem) = pending_path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".json"))
        else {
            return Ok(());
        };
        let uploads_dir = pending_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{stem}-files"));
        if !uploads_dir.is_dir() {
            return Ok(());
        }

        let dest_dir =
            self.config
                .paths
                .files_dir(Bucket::Current, job_id, relay_core::FileKind::Artifacts);
        for entry in std::fs::read_dir(&uploads_dir)?.flatten() {
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                std::fs::copy(entry.path(), dest_dir.join(entry.file_name()))?;
            }
        }
        std::fs::remove_dir_all(&uploads_dir)?;
        Ok(())
    }
}

fn into_io(e: serde_json::Error) -> DaemonError {
    DaemonError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
#[path = "intake_tests.rs"]
mod tests;
