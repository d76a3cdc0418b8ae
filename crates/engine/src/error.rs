// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine.

use relay_core::{BlockReason, LifecycleOp};
use thiserror::Error;

/// Errors that can occur while running tasks and pipelines.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Manifest(#[from] relay_manifest::ManifestError),
    #[error("invalid seed: {0}")]
    Seed(#[from] relay_manifest::SeedError),
    #[error("task {0:?} is not part of the pipeline")]
    UnknownTask(String),
    #[error(transparent)]
    Write(#[from] relay_storage::WriteError),
    #[error(transparent)]
    Atomic(#[from] relay_storage::AtomicWriteError),
    #[error(transparent)]
    StatusIo(#[from] relay_storage::StatusIoError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid log name: {0}")]
    LogName(#[from] relay_core::LogNameError),
    #[error("{kind} name {name:?} must not look like a log name")]
    LogShapedName { kind: &'static str, name: String },
    #[error("log name {name:?} belongs to task {found:?}, not {expected:?}")]
    LogTaskMismatch {
        name: String,
        found: String,
        expected: String,
    },
    #[error("task {task} stage {stage} protocol error: {message}")]
    Protocol {
        task: String,
        stage: String,
        message: String,
    },
    #[error("unsupported_lifecycle for task {task} (op {op}, http {http_status}): {reason}")]
    Lifecycle {
        task: String,
        op: LifecycleOp,
        reason: BlockReason,
        http_status: u16,
    },
    #[error("task {task} bridge error: {message}")]
    Bridge { task: String, message: String },
    #[error("task {task} failed at {failed_stage}: {message}")]
    TaskFailed {
        task: String,
        failed_stage: String,
        message: String,
    },
}

impl EngineError {
    /// Structured lifecycle rejection (always surfaced 409-style).
    pub fn lifecycle(task: impl Into<String>, op: LifecycleOp, reason: BlockReason) -> Self {
        EngineError::Lifecycle {
            task: task.into(),
            op,
            reason,
            http_status: 409,
        }
    }
}
