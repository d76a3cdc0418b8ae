// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-task file-IO facade.
//!
//! Scoped writer for a task's artifacts, logs, and tmp files. Every write
//! lands under `{jobDir}/files/{kind}/` and is mirrored into both the
//! job-scoped and task-scoped `files` lists of the status document. Log
//! names must parse under the log grammar and belong to this task;
//! artifact and tmp names must NOT look like log names, so observers can
//! classify `files.logs` entries from their names alone.

use crate::error::EngineError;
use crate::executor::{DirectiveKind, FileDirective};
use relay_core::{FileKind, LogName, Stage};
use relay_storage::{append_line, atomic_write, StatusWriter};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// How a write lands: `replace` is atomic, `append` adds to the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    #[default]
    Replace,
    Append,
}

/// Per-task scoped file writer, bound to one job directory.
#[derive(Clone)]
pub struct TaskFiles {
    job_dir: PathBuf,
    task: String,
    writer: StatusWriter,
    stage: Arc<parking_lot::Mutex<Option<Stage>>>,
}

impl TaskFiles {
    pub fn new(job_dir: impl Into<PathBuf>, task: impl Into<String>, writer: StatusWriter) -> Self {
        Self {
            job_dir: job_dir.into(),
            task: task.into(),
            writer,
            stage: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    /// The stage currently executing, as last noted by the stage runner.
    pub fn stage(&self) -> Option<Stage> {
        *self.stage.lock()
    }

    /// Record the executing stage, mirroring it into the task's status
    /// record so observers see incremental progress.
    pub async fn note_stage(&self, stage: Option<Stage>) -> Result<(), EngineError> {
        *self.stage.lock() = stage;
        self.writer
            .update_task(&self.job_dir, &self.task, move |t| {
                t.current_stage = stage;
            })
            .await?;
        Ok(())
    }

    /// Directory for one file kind.
    pub fn dir(&self, kind: FileKind) -> PathBuf {
        self.job_dir.join("files").join(kind.dir_name())
    }

    /// Write an artifact. The name must not be log-shaped.
    pub async fn write_artifact(
        &self,
        name: &str,
        content: &[u8],
        mode: WriteMode,
    ) -> Result<(), EngineError> {
        self.reject_log_shaped("artifact", name)?;
        self.write(FileKind::Artifacts, name, content, mode).await
    }

    /// Write a log. The name must parse under the grammar and belong to
    /// this task.
    pub async fn write_log(
        &self,
        name: &str,
        content: &[u8],
        mode: WriteMode,
    ) -> Result<(), EngineError> {
        let parsed = LogName::parse(name)?;
        if parsed.task != self.task {
            return Err(EngineError::LogTaskMismatch {
                name: name.to_string(),
                found: parsed.task,
                expected: self.task.clone(),
            });
        }
        self.write(FileKind::Logs, name, content, mode).await
    }

    /// Write a tmp file. Log-shaped names are rejected to prevent
    /// confusion with real logs.
    pub async fn write_tmp(
        &self,
        name: &str,
        content: &[u8],
        mode: WriteMode,
    ) -> Result<(), EngineError> {
        self.reject_log_shaped("tmp", name)?;
        self.write(FileKind::Tmp, name, content, mode).await
    }

    pub fn read_artifact(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        Ok(std::fs::read(self.dir(FileKind::Artifacts).join(name))?)
    }

    pub fn read_log(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        Ok(std::fs::read(self.dir(FileKind::Logs).join(name))?)
    }

    pub fn read_tmp(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        Ok(std::fs::read(self.dir(FileKind::Tmp).join(name))?)
    }

    /// Apply a stage response's file directive through the facade.
    pub async fn apply(&self, directive: &FileDirective) -> Result<(), EngineError> {
        let content = directive.content.as_bytes();
        match directive.kind {
            DirectiveKind::Artifact => {
                self.write_artifact(&directive.name, content, directive.mode)
                    .await
            }
            DirectiveKind::Log => self.write_log(&directive.name, content, directive.mode).await,
            DirectiveKind::Tmp => self.write_tmp(&directive.name, content, directive.mode).await,
        }
    }

    fn reject_log_shaped(&self, kind: &'static str, name: &str) -> Result<(), EngineError> {
        if LogName::matches(name) {
            return Err(EngineError::LogShapedName {
                kind,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    async fn write(
        &self,
        kind: FileKind,
        name: &str,
        content: &[u8],
        mode: WriteMode,
    ) -> Result<(), EngineError> {
        let path = self.dir(kind).join(name);
        match mode {
            WriteMode::Replace => atomic_write(&path, content)?,
            WriteMode::Append => append_line(&path, content)?,
        }

        let task = self.task.clone();
        let name = name.to_string();
        self.writer
            .update(&self.job_dir, move |doc| {
                doc.mirror_file(&task, kind, &name);
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "file_io_tests.rs"]
mod tests;
