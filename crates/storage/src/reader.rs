// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only job queries.
//!
//! Readers never mutate the filesystem and never take the per-job write
//! queue; they see whatever the last committed atomic write left behind.

use crate::paths::{job_files, DataPaths};
use crate::status_io::{load_status, StatusIoError};
use chrono::{SecondsFormat, Utc};
use relay_core::{Bucket, JobId, StatusDoc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors from job reads.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("job not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Status(#[from] StatusIoError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata written to `job.json` at promotion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMeta {
    pub id: String,
    pub name: String,
    pub pipeline: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_hash: Option<String>,
}

/// A job's state as seen by external queriers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: String,
    pub bucket: Bucket,
    pub status: StatusDoc,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<JobMeta>,
}

impl JobView {
    fn created_at(&self) -> &str {
        self.meta.as_ref().map(|m| m.created_at.as_str()).unwrap_or("")
    }
}

/// List valid job directories in a bucket: regex-matched ids, non-hidden,
/// tolerant of a missing bucket and of unreadable entries.
pub fn list_jobs(paths: &DataPaths, bucket: Bucket) -> Vec<String> {
    let dir = paths.bucket(bucket);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "bucket not listable");
            return Vec::new();
        }
    };

    let mut jobs: Vec<String> = entries
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name().into_string().ok()?;
            if name.starts_with('.') || JobId::check(&name).is_err() {
                return None;
            }
            entry.file_type().ok()?.is_dir().then_some(name)
        })
        .collect();
    jobs.sort();
    jobs
}

/// Read one job's status and metadata. When `bucket` is omitted, the
/// current bucket is searched before complete.
pub fn read_job(
    paths: &DataPaths,
    job_id: &str,
    bucket: Option<Bucket>,
) -> Result<JobView, ReadError> {
    let candidates: &[Bucket] = match bucket {
        Some(ref b) => std::slice::from_ref(b),
        None => &[Bucket::Current, Bucket::Complete],
    };

    for &bucket in candidates {
        let job_dir = paths.job_dir(bucket, job_id);
        if !job_dir.is_dir() {
            continue;
        }
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let status = load_status(&job_dir.join(job_files::STATUS), job_id, &now)?;
        let meta = read_meta(&job_dir);
        return Ok(JobView {
            id: job_id.to_string(),
            bucket,
            status,
            meta,
        });
    }

    Err(ReadError::NotFound(job_id.to_string()))
}

fn read_meta(job_dir: &Path) -> Option<JobMeta> {
    let bytes = std::fs::read(job_dir.join(job_files::JOB_META)).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Merge current and complete listings with current-wins precedence on
/// duplicate ids, sorted by `(statusPriority, createdAt, id)`.
pub fn aggregate_jobs(current: Vec<JobView>, complete: Vec<JobView>) -> Vec<JobView> {
    let mut merged = current;
    for job in complete {
        if !merged.iter().any(|j| j.id == job.id) {
            merged.push(job);
        }
    }
    merged.sort_by(|a, b| {
        a.status
            .state
            .priority()
            .cmp(&b.status.state.priority())
            .then_with(|| a.created_at().cmp(b.created_at()))
            .then_with(|| a.id.cmp(&b.id))
    });
    merged
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
