// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pipeline runner: drives every task of one job, in order.
//!
//! Invoked as a subprocess of the lifecycle manager with the job id as
//! its only required argument; everything else arrives through the
//! environment. The runner owns its job directory while the job sits in
//! `current`: it advances task records through the status writer, runs
//! each task's stage machine against a registry co-process, and on
//! success renames the directory into `complete` and appends the run
//! journal.
//!
//! Task contexts start with two entries in `data`: `seed` (the full seed
//! document) and `upstream` (a map of completed task names to their
//! rehydrated `output.json` values).

use crate::bridge;
use crate::context::TaskContext;
use crate::error::EngineError;
use crate::executor::ExecutorFactory;
use crate::file_io::{TaskFiles, WriteMode};
use crate::stage_machine::{run_task_stages, StageParams, TaskRunOutcome};
use relay_core::{
    decide, BlockReason, Bucket, BusEvent, Clock, EventSink, LifecycleOp, PolicyInput, Stage,
    StatusDoc, TaskState,
};
use relay_manifest::{PipelineDef, Seed, TaskRegistry};
use relay_storage::{
    append_run_summary, atomic_write, load_status, DataPaths, RunSummary, StatusWriter,
};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Runner inputs, assembled from the environment by the binary.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub paths: DataPaths,
    pub job_id: String,
    /// Explicit pipeline definition path; defaults to the job's snapshot.
    pub pipeline_path: Option<PathBuf>,
    /// Registry fallback when neither the override nor the snapshot
    /// exists: `{configDir}/pipelines/{slug}.json`.
    pub config_dir: Option<PathBuf>,
    pub pipeline_slug: Option<String>,
    pub registry_path: PathBuf,
    pub start_from_task: Option<String>,
    pub run_single_task: bool,
}

/// Collaborators, generic over the executor factory so tests run tasks
/// in-process.
pub struct RunnerDeps<F: ExecutorFactory> {
    pub factory: F,
    pub writer: StatusWriter,
    pub sink: Arc<dyn EventSink>,
    pub clock: Arc<dyn Clock>,
}

/// How the run ended. Lifecycle and I/O errors are `Err`s instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// All tasks done; job moved to the complete bucket.
    Completed,
    /// Single-task mode finished its task; job stays in current.
    SingleTask,
    /// A task failed; job stays in current with `state = failed`.
    Failed { task: String },
}

/// Write the runner's PID file. Registered for removal on every
/// termination path by the binary.
pub fn write_pid_file(job_dir: &Path) -> std::io::Result<PathBuf> {
    let path = job_dir.join("runner.pid");
    std::fs::write(&path, format!("{}\n", std::process::id()))?;
    Ok(path)
}

/// Remove the PID file; safe to call from signal handlers and multiple
/// times.
pub fn remove_pid_file(job_dir: &Path) {
    let _ = std::fs::remove_file(job_dir.join("runner.pid"));
}

/// Run every task of one job in pipeline order.
pub async fn run_job<F: ExecutorFactory>(
    config: &RunnerConfig,
    deps: &RunnerDeps<F>,
) -> Result<RunOutcome, EngineError> {
    let job_dir = config.paths.job_dir(Bucket::Current, &config.job_id);
    if !job_dir.is_dir() {
        return Err(EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("job directory {} does not exist", job_dir.display()),
        )));
    }

    let seed_bytes = std::fs::read(job_dir.join("seed.json"))?;
    let seed = Seed::from_slice(&seed_bytes)?;

    let pipeline = load_pipeline(config, &job_dir, &seed)?;
    let registry = TaskRegistry::load(&config.registry_path)?;

    let start_pos = match &config.start_from_task {
        Some(task) => Some(
            pipeline
                .position(task)
                .ok_or_else(|| EngineError::UnknownTask(task.clone()))?,
        ),
        None => None,
    };

    info!(
        job_id = %config.job_id,
        pipeline = %pipeline.name,
        tasks = pipeline.tasks.len(),
        start_from = config.start_from_task.as_deref().unwrap_or("-"),
        "pipeline run starting"
    );

    // Outputs of completed tasks, keyed by task name.
    let mut upstream: Map<String, Value> = Map::new();

    for (ix, task_name) in pipeline.tasks.iter().enumerate() {
        let doc = load_status(
            &job_dir.join("tasks-status.json"),
            &config.job_id,
            &deps.clock.iso(),
        )?;
        let task_state = doc
            .tasks
            .get(task_name)
            .map(|t| t.state)
            .unwrap_or(TaskState::Pending);

        if let Some(start) = start_pos {
            if ix < start {
                if task_state == TaskState::Done {
                    rehydrate_output(&job_dir, task_name, &mut upstream);
                }
                continue;
            }
        }

        if task_state == TaskState::Done {
            rehydrate_output(&job_dir, task_name, &mut upstream);
            continue;
        }

        let dependencies_ready = pipeline.tasks[..ix].iter().all(|t| {
            doc.tasks
                .get(t)
                .is_some_and(|r| r.state == TaskState::Done)
        });

        // A restart-from target may sit in `failed`; everything else goes
        // through the plain start gate.
        let op = if task_state == TaskState::Failed && start_pos.is_some() {
            LifecycleOp::Restart
        } else {
            LifecycleOp::Start
        };
        let decision = decide(PolicyInput {
            op,
            task_state,
            dependencies_ready,
        });
        if !decision.ok {
            let reason = decision.reason.unwrap_or(BlockReason::NotRunning);
            deps.sink.publish(BusEvent::LifecycleBlock {
                job_id: config.job_id.clone(),
                task_id: task_name.clone(),
                op,
                reason,
            });
            return Err(EngineError::lifecycle(task_name, op, reason));
        }
        if op == LifecycleOp::Restart {
            deps.writer
                .update_task(&job_dir, task_name, |t| t.reset(false))
                .await?;
        }

        let started_at = deps.clock.iso();
        let start_instant = Instant::now();
        deps.writer
            .update_task(&job_dir, task_name, move |t| {
                t.state = TaskState::Running;
                t.attempts += 1;
                t.started_at = Some(started_at);
                t.ended_at = None;
                t.error = None;
                t.failed_stage = None;
                t.current_stage = Some(Stage::Ingestion);
            })
            .await?;

        let files = TaskFiles::new(&job_dir, task_name, deps.writer.clone());

        let task_dir = match bridge::ensure_bridge(&job_dir, task_name) {
            Ok(dir) => dir,
            Err(e) => {
                fail_task(deps, &job_dir, task_name, None, &e.to_string(), 0, 0).await?;
                return Ok(RunOutcome::Failed {
                    task: task_name.clone(),
                });
            }
        };

        let resolved = match registry.resolve(task_name) {
            Ok(resolved) => resolved,
            Err(e) => {
                fail_task(deps, &job_dir, task_name, None, &e.to_string(), 0, 0).await?;
                return Ok(RunOutcome::Failed {
                    task: task_name.clone(),
                });
            }
        };

        let mut initial_context = TaskContext::default();
        initial_context
            .data
            .insert("seed".to_string(), serde_json::to_value(&seed).unwrap_or(Value::Null));
        initial_context
            .data
            .insert("upstream".to_string(), Value::Object(upstream.clone()));

        let params = StageParams {
            job_id: config.job_id.clone(),
            task: task_name.clone(),
            initial_context,
            config: pipeline.config_for(task_name).cloned(),
            tuning: pipeline.tuning_for(task_name),
            work_dir: job_dir.clone(),
            task_dir: task_dir.clone(),
        };

        let mut executor = match deps.factory.spawn(&resolved, &task_dir).await {
            Ok(executor) => executor,
            Err(e) => {
                fail_task(deps, &job_dir, task_name, None, &e.to_string(), 0, 0).await?;
                return Ok(RunOutcome::Failed {
                    task: task_name.clone(),
                });
            }
        };

        let outcome = run_task_stages(executor.as_mut(), &files, params).await;
        executor.shutdown().await;
        let elapsed_ms = start_instant.elapsed().as_millis() as u64;

        if !outcome.ok {
            record_failure(deps, &job_dir, task_name, &files, &outcome, elapsed_ms).await?;
            return Ok(RunOutcome::Failed {
                task: task_name.clone(),
            });
        }

        record_success(deps, &job_dir, task_name, &files, &outcome, elapsed_ms).await?;

        let output_value = outcome.context.output.clone().unwrap_or(Value::Null);
        let output_bytes =
            serde_json::to_vec_pretty(&output_value).unwrap_or_else(|_| b"null".to_vec());
        atomic_write(&task_dir.join("output.json"), &output_bytes)?;
        upstream.insert(task_name.clone(), output_value);

        if config.run_single_task && start_pos == Some(ix) {
            info!(job_id = %config.job_id, task = %task_name, "single-task run complete");
            return Ok(RunOutcome::SingleTask);
        }
    }

    if config.run_single_task {
        return Ok(RunOutcome::SingleTask);
    }

    finalize_job(config, deps, &pipeline, &job_dir).await?;
    Ok(RunOutcome::Completed)
}

/// Resolve the pipeline definition: explicit path, then the job's
/// snapshot, then the registry via slug (env override, else the seed's).
fn load_pipeline(
    config: &RunnerConfig,
    job_dir: &Path,
    seed: &Seed,
) -> Result<PipelineDef, EngineError> {
    if let Some(path) = &config.pipeline_path {
        return Ok(PipelineDef::load(path)?);
    }
    let snapshot = job_dir.join("pipeline.json");
    if snapshot.is_file() {
        return Ok(PipelineDef::load(&snapshot)?);
    }
    let slug = config
        .pipeline_slug
        .clone()
        .unwrap_or_else(|| seed.pipeline.clone());
    let config_dir = config.config_dir.as_deref().ok_or_else(|| {
        EngineError::Manifest(relay_manifest::ManifestError::UnknownPipeline(slug.clone()))
    })?;
    Ok(PipelineDef::load_from_registry(config_dir, &slug)?)
}

/// Pull a completed task's `output.json` into the upstream map.
fn rehydrate_output(job_dir: &Path, task: &str, upstream: &mut Map<String, Value>) {
    let path = job_dir.join("tasks").join(task).join("output.json");
    match std::fs::read(&path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(value) => {
                upstream.insert(task.to_string(), value);
            }
            Err(e) => warn!(task, error = %e, "output.json unparseable, skipping rehydration"),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(task, error = %e, "output.json unreadable, skipping rehydration"),
    }
}

/// Write the failure log pair and the final failed task record.
async fn record_failure<F: ExecutorFactory>(
    deps: &RunnerDeps<F>,
    job_dir: &Path,
    task_name: &str,
    files: &TaskFiles,
    outcome: &TaskRunOutcome,
    elapsed_ms: u64,
) -> Result<(), EngineError> {
    let failed_stage = outcome.failed_stage.unwrap_or(Stage::Ingestion);
    let error = outcome
        .error
        .clone()
        .unwrap_or_else(|| "task failed".to_string());
    let logs_value = serde_json::to_value(&outcome.logs).unwrap_or(Value::Null);

    let exec_logs = format!("{task_name}-{failed_stage}-execution-logs.json");
    if let Err(e) = files
        .write_log(
            &exec_logs,
            &serde_json::to_vec_pretty(&logs_value).unwrap_or_default(),
            WriteMode::Replace,
        )
        .await
    {
        warn!(task = task_name, error = %e, "execution-logs write failed");
    }

    let details = json!({
        "error": error,
        "failedStage": failed_stage,
        "previousStage": outcome.previous_stage,
        "refinementAttempts": outcome.refinement_attempts,
        "context": outcome.context,
        "logs": logs_value,
    });
    let details_name = format!("{task_name}-{failed_stage}-failure-details.json");
    if let Err(e) = files
        .write_log(
            &details_name,
            &serde_json::to_vec_pretty(&details).unwrap_or_default(),
            WriteMode::Replace,
        )
        .await
    {
        warn!(task = task_name, error = %e, "failure-details write failed");
    }

    let ended_at = deps.clock.iso();
    let refinement_attempts = outcome.refinement_attempts;
    let previous_stage = outcome.previous_stage.clone();
    let error_value = json!(error);
    deps.writer
        .update_task(job_dir, task_name, move |t| {
            t.state = TaskState::Failed;
            t.ended_at = Some(ended_at);
            t.error = Some(error_value);
            t.failed_stage = Some(failed_stage);
            t.refinement_attempts = refinement_attempts;
            t.execution_time_ms = Some(elapsed_ms);
            t.current_stage = None;
            t.error_context = Some(json!({
                "previousStage": previous_stage,
                "attempts": t.attempts,
            }));
        })
        .await?;
    Ok(())
}

/// Fail a task before its stage machine ever ran (bridge, resolution, or
/// spawn failures).
async fn fail_task<F: ExecutorFactory>(
    deps: &RunnerDeps<F>,
    job_dir: &Path,
    task_name: &str,
    failed_stage: Option<Stage>,
    error: &str,
    refinement_attempts: u32,
    elapsed_ms: u64,
) -> Result<(), EngineError> {
    let ended_at = deps.clock.iso();
    let error_value = json!(error);
    deps.writer
        .update_task(job_dir, task_name, move |t| {
            t.state = TaskState::Failed;
            t.ended_at = Some(ended_at);
            t.error = Some(error_value);
            t.failed_stage = failed_stage;
            t.refinement_attempts = refinement_attempts;
            t.execution_time_ms = Some(elapsed_ms);
            t.current_stage = None;
        })
        .await?;
    Ok(())
}

/// Write the success log and the final done task record.
async fn record_success<F: ExecutorFactory>(
    deps: &RunnerDeps<F>,
    job_dir: &Path,
    task_name: &str,
    files: &TaskFiles,
    outcome: &TaskRunOutcome,
    elapsed_ms: u64,
) -> Result<(), EngineError> {
    let logs_value = serde_json::to_value(&outcome.logs).unwrap_or(Value::Null);
    let exec_logs = format!("{task_name}-finalization-execution-logs.json");
    if let Err(e) = files
        .write_log(
            &exec_logs,
            &serde_json::to_vec_pretty(&logs_value).unwrap_or_default(),
            WriteMode::Replace,
        )
        .await
    {
        warn!(task = task_name, error = %e, "execution-logs write failed");
    }

    let ended_at = deps.clock.iso();
    let refinement_attempts = outcome.refinement_attempts;
    deps.writer
        .update_task(job_dir, task_name, move |t| {
            t.state = TaskState::Done;
            t.ended_at = Some(ended_at);
            t.execution_time_ms = Some(elapsed_ms);
            t.refinement_attempts = refinement_attempts;
            t.current_stage = None;
        })
        .await?;
    Ok(())
}

/// Move the finished job to the complete bucket, journal the run, then
/// sweep the task bridges out of the archive.
async fn finalize_job<F: ExecutorFactory>(
    config: &RunnerConfig,
    deps: &RunnerDeps<F>,
    pipeline: &PipelineDef,
    job_dir: &Path,
) -> Result<(), EngineError> {
    let doc = load_status(
        &job_dir.join("tasks-status.json"),
        &config.job_id,
        &deps.clock.iso(),
    )?;

    std::fs::create_dir_all(config.paths.bucket(Bucket::Complete))?;
    let dest = config.paths.job_dir(Bucket::Complete, &config.job_id);
    std::fs::rename(job_dir, &dest)?;

    let summary = run_summary(&config.job_id, &deps.clock.iso(), pipeline, &doc);
    append_run_summary(&config.paths, &summary)?;

    bridge::sweep_bridges(&dest);

    info!(job_id = %config.job_id, dest = %dest.display(), "job archived");
    Ok(())
}

fn run_summary(
    job_id: &str,
    finished_at: &str,
    pipeline: &PipelineDef,
    doc: &StatusDoc,
) -> RunSummary {
    RunSummary {
        id: job_id.to_string(),
        finished_at: finished_at.to_string(),
        tasks: pipeline.tasks.clone(),
        total_time_ms: doc
            .tasks
            .values()
            .filter_map(|t| t.execution_time_ms)
            .sum(),
        total_refinement_attempts: doc.tasks.values().map(|t| t.refinement_attempts).sum(),
        final_artifacts: doc.files.artifacts.clone(),
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
