// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The append-only run journal (`complete/runs.jsonl`).

use crate::atomic::{append_line, AtomicWriteError};
use crate::paths::DataPaths;
use serde::{Deserialize, Serialize};

/// One line of `runs.jsonl`, summarizing a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub id: String,
    pub finished_at: String,
    /// Task names in execution order.
    pub tasks: Vec<String>,
    pub total_time_ms: u64,
    pub total_refinement_attempts: u32,
    /// Artifact names produced across all tasks.
    pub final_artifacts: Vec<String>,
}

/// Append a run summary to the journal, creating it on first use.
pub fn append_run_summary(
    paths: &DataPaths,
    summary: &RunSummary,
) -> Result<(), AtomicWriteError> {
    let line = serde_json::to_vec(summary).map_err(|e| {
        AtomicWriteError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    append_line(&paths.runs_journal(), &line)
}

#[cfg(test)]
#[path = "runs_tests.rs"]
mod tests;
