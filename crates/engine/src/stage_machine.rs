// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The stage runner: drives one task through the fixed stage sequence.
//!
//! Control flow is table-driven off [`Stage::successor`]. The only
//! non-linear edge is refinement: after `validation`, if the stage set
//! `needsRefinement` (or the validation stage itself failed) and budget
//! remains, control enters `refinement` and jumps back to
//! `prompt-assembly`. The loop is bounded by the task's configured
//! `maxRefinementAttempts`; on exhaustion the run fails at `validation`.

use crate::context::{StageLogRecord, TaskContext};
use crate::error::EngineError;
use crate::executor::{StageExecutor, StageRequest};
use crate::file_io::TaskFiles;
use relay_core::{LogEvent, Stage};
use relay_manifest::TaskTuning;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Inputs for one task's stage run.
#[derive(Debug, Clone)]
pub struct StageParams {
    pub job_id: String,
    pub task: String,
    pub initial_context: TaskContext,
    pub config: Option<Value>,
    pub tuning: TaskTuning,
    pub work_dir: PathBuf,
    pub task_dir: PathBuf,
}

/// Result of one task's stage run.
#[derive(Debug)]
pub struct TaskRunOutcome {
    pub ok: bool,
    pub failed_stage: Option<Stage>,
    pub error: Option<String>,
    pub context: TaskContext,
    pub logs: Vec<StageLogRecord>,
    pub refinement_attempts: u32,
    /// Most recently completed stage at exit (`"seed"` if none).
    pub previous_stage: String,
}

impl TaskRunOutcome {
    fn failed(
        stage: Stage,
        error: String,
        context: TaskContext,
        logs: Vec<StageLogRecord>,
        refinement_attempts: u32,
        previous_stage: String,
    ) -> Self {
        Self {
            ok: false,
            failed_stage: Some(stage),
            error: Some(error),
            context,
            logs,
            refinement_attempts,
            previous_stage,
        }
    }
}

/// Run the stage sequence for one task.
pub async fn run_task_stages(
    executor: &mut dyn StageExecutor,
    files: &TaskFiles,
    params: StageParams,
) -> TaskRunOutcome {
    let mut context = params.initial_context.clone();
    let mut logs: Vec<StageLogRecord> = Vec::new();
    let mut refinement_attempts: u32 = 0;
    let mut previous_stage = "seed".to_string();
    let mut last_validation_error: Option<String> = None;
    let mut stage = Stage::Ingestion;

    loop {
        if let Err(e) = files.note_stage(Some(stage)).await {
            return TaskRunOutcome::failed(
                stage,
                e.to_string(),
                context,
                logs,
                refinement_attempts,
                previous_stage,
            );
        }

        logs.push(StageLogRecord {
            stage,
            event: LogEvent::Start,
            ms: 0,
            payload: None,
        });

        let request = StageRequest {
            stage,
            task: params.task.clone(),
            job_id: params.job_id.clone(),
            refinement_attempts,
            previous_stage: previous_stage.clone(),
            context: context.clone(),
            logs: logs.clone(),
            config: params.config.clone(),
            work_dir: params.work_dir.clone(),
            task_dir: params.task_dir.clone(),
        };

        let started = Instant::now();
        let called = match params.tuning.stage_timeout_ms {
            Some(ms) => {
                match tokio::time::timeout(Duration::from_millis(ms), executor.call(request)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(EngineError::Protocol {
                        task: params.task.clone(),
                        stage: stage.as_str().to_string(),
                        message: format!("stage timed out after {ms}ms"),
                    }),
                }
            }
            None => executor.call(request).await,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        // Collapse transport errors and explicit stage failures into one
        // failure path; apply file directives on success first so a bad
        // directive (e.g. malformed log name) fails the stage that issued
        // it.
        let stage_result: Result<(Option<TaskContext>, Option<Value>), String> = match called {
            Err(e) => Err(e.to_string()),
            Ok(response) if !response.ok => {
                Err(response.error.unwrap_or_else(|| "stage failed".to_string()))
            }
            Ok(response) => {
                let mut result = Ok(());
                for directive in &response.files {
                    if let Err(e) = files.apply(directive).await {
                        result = Err(e.to_string());
                        break;
                    }
                }
                match result {
                    Ok(()) => Ok((response.context, response.log_payload)),
                    Err(e) => Err(e),
                }
            }
        };

        match stage_result {
            Ok((replacement, payload)) => {
                if let Some(new_context) = replacement {
                    context = new_context;
                }
                logs.push(StageLogRecord {
                    stage,
                    event: LogEvent::Complete,
                    ms: elapsed_ms,
                    payload,
                });
                debug!(task = %params.task, %stage, elapsed_ms, "stage complete");

                if stage == Stage::Validation && context.flags.needs_refinement {
                    previous_stage = stage.as_str().to_string();
                    if refinement_attempts < params.tuning.max_refinement_attempts {
                        refinement_attempts += 1;
                        context.flags.needs_refinement = false;
                        stage = Stage::Refinement;
                        continue;
                    }
                    let mut message = format!(
                        "validation failed after {refinement_attempts} refinement attempts"
                    );
                    if let Some(last) = &last_validation_error {
                        message = format!("{message} (last error: {last})");
                    }
                    return TaskRunOutcome::failed(
                        Stage::Validation,
                        message,
                        context,
                        logs,
                        refinement_attempts,
                        previous_stage,
                    );
                }

                previous_stage = stage.as_str().to_string();
                match stage.successor() {
                    Some(next) => {
                        stage = next;
                    }
                    None => {
                        return TaskRunOutcome {
                            ok: true,
                            failed_stage: None,
                            error: None,
                            context,
                            logs,
                            refinement_attempts,
                            previous_stage,
                        };
                    }
                }
            }
            Err(message) => {
                logs.push(StageLogRecord {
                    stage,
                    event: LogEvent::Error,
                    ms: elapsed_ms,
                    payload: Some(json!({ "error": message })),
                });
                warn!(task = %params.task, %stage, error = %message, "stage failed");

                // A failing validation joins the refine loop while budget
                // remains; any other stage fails the task immediately.
                if stage == Stage::Validation
                    && refinement_attempts < params.tuning.max_refinement_attempts
                {
                    last_validation_error = Some(message);
                    refinement_attempts += 1;
                    previous_stage = stage.as_str().to_string();
                    stage = Stage::Refinement;
                    continue;
                }

                return TaskRunOutcome::failed(
                    stage,
                    message,
                    context,
                    logs,
                    refinement_attempts,
                    previous_stage,
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "stage_machine_tests.rs"]
mod tests;
