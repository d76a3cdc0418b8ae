// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for manifest parsing and resolution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading and validating manifests.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid pipeline definition: {0}")]
    InvalidPipeline(String),
    #[error("unknown pipeline: {0}")]
    UnknownPipeline(String),
    #[error("task module resolution failed for {task}: {}", attempts.join("; "))]
    TaskResolution { task: String, attempts: Vec<String> },
}
