// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage execution over task co-processes.
//!
//! Each pipeline task is an executable named by the task registry. The
//! runner spawns it once per task run and sends one JSON request line on
//! its stdin per stage, reading one JSON response line from its stdout.
//! The process lives for the whole task (refine iterations included) so
//! it can keep provider connections warm between stages.

use crate::context::{StageLogRecord, TaskContext};
use crate::error::EngineError;
use crate::file_io::WriteMode;
use async_trait::async_trait;
use relay_core::Stage;
use relay_manifest::ResolvedTask;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

/// One stage invocation, serialized as a single request line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRequest {
    pub stage: Stage,
    pub task: String,
    pub job_id: String,
    pub refinement_attempts: u32,
    /// Most recently completed stage; `"seed"` on initial entry.
    pub previous_stage: String,
    pub context: TaskContext,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<StageLogRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    pub work_dir: PathBuf,
    pub task_dir: PathBuf,
}

/// A file the stage asks the runner to write through the task-IO facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDirective {
    pub kind: DirectiveKind,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub mode: WriteMode,
}

/// Which facade method a directive routes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveKind {
    Artifact,
    Log,
    Tmp,
}

/// One stage's response line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResponse {
    #[serde(default = "default_true")]
    pub ok: bool,
    /// Replacement context; absent means "keep the current one".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<TaskContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileDirective>,
    /// Optional payload attached to the stage's completion log record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_payload: Option<Value>,
}

impl Default for StageResponse {
    /// An empty success: keep the context, write nothing.
    fn default() -> Self {
        Self {
            ok: true,
            context: None,
            error: None,
            files: Vec::new(),
            log_payload: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Executes stages for one task run.
#[async_trait]
pub trait StageExecutor: Send {
    async fn call(&mut self, request: StageRequest) -> Result<StageResponse, EngineError>;

    /// Release the underlying resources (kills a co-process).
    async fn shutdown(&mut self);
}

/// Creates executors; the runner asks for one per task. Generic so tests
/// inject in-process fakes.
#[async_trait]
pub trait ExecutorFactory: Send + Sync {
    async fn spawn(
        &self,
        task: &ResolvedTask,
        task_dir: &Path,
    ) -> Result<Box<dyn StageExecutor>, EngineError>;
}

/// Production executor: a co-process speaking line-framed JSON.
pub struct ProcessExecutor {
    task: String,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ProcessExecutor {
    /// Spawn the task's binary with its registry args/env, cwd'd into the
    /// task directory.
    pub async fn spawn(
        resolved: &ResolvedTask,
        task_dir: &Path,
        extra_env: &[(String, String)],
    ) -> Result<ProcessExecutor, EngineError> {
        let mut command = Command::new(&resolved.binary);
        command
            .args(&resolved.args)
            .current_dir(task_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        for (k, v) in &resolved.env {
            command.env(k, v);
        }
        for (k, v) in extra_env {
            command.env(k, v);
        }

        let mut child = command.spawn().map_err(|e| EngineError::Protocol {
            task: resolved.name.clone(),
            stage: "spawn".to_string(),
            message: format!("failed to spawn {}: {e}", resolved.binary.display()),
        })?;

        let stdin = child.stdin.take().ok_or_else(|| EngineError::Protocol {
            task: resolved.name.clone(),
            stage: "spawn".to_string(),
            message: "child stdin unavailable".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| EngineError::Protocol {
            task: resolved.name.clone(),
            stage: "spawn".to_string(),
            message: "child stdout unavailable".to_string(),
        })?;

        debug!(task = %resolved.name, binary = %resolved.binary.display(), "task co-process spawned");

        Ok(ProcessExecutor {
            task: resolved.name.clone(),
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    fn protocol_error(&self, stage: Stage, message: impl Into<String>) -> EngineError {
        EngineError::Protocol {
            task: self.task.clone(),
            stage: stage.as_str().to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl StageExecutor for ProcessExecutor {
    async fn call(&mut self, request: StageRequest) -> Result<StageResponse, EngineError> {
        let stage = request.stage;
        let mut line = serde_json::to_vec(&request)
            .map_err(|e| self.protocol_error(stage, format!("request encoding: {e}")))?;
        line.push(b'\n');

        self.stdin
            .write_all(&line)
            .await
            .map_err(|e| self.protocol_error(stage, format!("request write: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| self.protocol_error(stage, format!("request flush: {e}")))?;

        let mut response_line = String::new();
        let n = self
            .stdout
            .read_line(&mut response_line)
            .await
            .map_err(|e| self.protocol_error(stage, format!("response read: {e}")))?;
        if n == 0 {
            return Err(self.protocol_error(stage, "task process closed stdout"));
        }

        serde_json::from_str(&response_line)
            .map_err(|e| self.protocol_error(stage, format!("response parse: {e}")))
    }

    async fn shutdown(&mut self) {
        // Closing stdin is the orderly stop signal for a well-behaved
        // task loop; fall back to kill if it lingers.
        let _ = self.stdin.shutdown().await;
        match tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(Ok(status)) => debug!(task = %self.task, %status, "task co-process exited"),
            Ok(Err(e)) => warn!(task = %self.task, error = %e, "task co-process wait failed"),
            Err(_) => {
                warn!(task = %self.task, "task co-process did not exit, killing");
                let _ = self.child.kill().await;
            }
        }
    }
}

/// Factory for [`ProcessExecutor`]s with job-scoped environment.
pub struct ProcessExecutorFactory {
    pub extra_env: Vec<(String, String)>,
}

impl ProcessExecutorFactory {
    pub fn new(extra_env: Vec<(String, String)>) -> Self {
        Self { extra_env }
    }
}

#[async_trait]
impl ExecutorFactory for ProcessExecutorFactory {
    async fn spawn(
        &self,
        task: &ResolvedTask,
        task_dir: &Path,
    ) -> Result<Box<dyn StageExecutor>, EngineError> {
        Ok(Box::new(
            ProcessExecutor::spawn(task, task_dir, &self.extra_env).await?,
        ))
    }
}

/// In-process executor for tests: a function from request to response.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeExecutor {
    script: std::sync::Arc<
        dyn Fn(&StageRequest) -> Result<StageResponse, EngineError> + Send + Sync,
    >,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeExecutor {
    pub fn new(
        script: impl Fn(&StageRequest) -> Result<StageResponse, EngineError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: std::sync::Arc::new(script),
        }
    }

    /// An executor whose every stage succeeds without touching anything.
    pub fn always_ok() -> Self {
        Self::new(|_| Ok(StageResponse::default()))
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl StageExecutor for FakeExecutor {
    async fn call(&mut self, request: StageRequest) -> Result<StageResponse, EngineError> {
        (self.script)(&request)
    }

    async fn shutdown(&mut self) {}
}

/// Factory handing out [`FakeExecutor`]s sharing one script.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone)]
pub struct FakeExecutorFactory {
    script: std::sync::Arc<
        dyn Fn(&StageRequest) -> Result<StageResponse, EngineError> + Send + Sync,
    >,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeExecutorFactory {
    pub fn new(
        script: impl Fn(&StageRequest) -> Result<StageResponse, EngineError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: std::sync::Arc::new(script),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl ExecutorFactory for FakeExecutorFactory {
    async fn spawn(
        &self,
        _task: &ResolvedTask,
        _task_dir: &Path,
    ) -> Result<Box<dyn StageExecutor>, EngineError> {
        let script = std::sync::Arc::clone(&self.script);
        Ok(Box::new(FakeExecutor { script }))
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
