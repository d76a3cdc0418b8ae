// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::executor::{DirectiveKind, FakeExecutorFactory, FileDirective, StageResponse};
use relay_core::{JobState, NoopSink, RecordingSink, SystemClock, Topic};
use tempfile::TempDir;

struct TestJob {
    _dir: TempDir,
    paths: DataPaths,
    job_dir: PathBuf,
    registry_path: PathBuf,
}

fn setup(tasks: &[&str]) -> TestJob {
    let dir = TempDir::new().unwrap();
    let paths = DataPaths::new(dir.path());
    let job_dir = paths.job_dir(Bucket::Current, "j1");
    std::fs::create_dir_all(&job_dir).unwrap();

    std::fs::write(
        job_dir.join("seed.json"),
        r#"{"name":"s1","data":{"x":1},"pipeline":"p1"}"#,
    )
    .unwrap();

    let pipeline = json!({ "name": "p1", "tasks": tasks });
    std::fs::write(
        job_dir.join("pipeline.json"),
        serde_json::to_vec(&pipeline).unwrap(),
    )
    .unwrap();

    let bin = dir.path().join("task-bin");
    std::fs::write(&bin, "#!/bin/sh\n").unwrap();
    let registry: Map<String, Value> = tasks
        .iter()
        .map(|t| (t.to_string(), json!({ "binary": bin })))
        .collect();
    let registry_path = dir.path().join("tasks.json");
    std::fs::write(&registry_path, serde_json::to_vec(&registry).unwrap()).unwrap();

    TestJob {
        _dir: dir,
        paths,
        job_dir,
        registry_path,
    }
}

fn config(job: &TestJob) -> RunnerConfig {
    RunnerConfig {
        paths: job.paths.clone(),
        job_id: "j1".to_string(),
        pipeline_path: None,
        config_dir: None,
        pipeline_slug: None,
        registry_path: job.registry_path.clone(),
        start_from_task: None,
        run_single_task: false,
    }
}

fn deps(factory: FakeExecutorFactory) -> RunnerDeps<FakeExecutorFactory> {
    RunnerDeps {
        factory,
        writer: StatusWriter::system(Arc::new(NoopSink)),
        sink: Arc::new(NoopSink),
        clock: Arc::new(SystemClock),
    }
}

/// A task script that emits `{task}-output.json` at finalization.
fn producing_factory() -> FakeExecutorFactory {
    FakeExecutorFactory::new(|req| {
        let mut response = StageResponse::default();
        if req.stage == Stage::Finalization {
            response.files.push(FileDirective {
                kind: DirectiveKind::Artifact,
                name: format!("{}-output.json", req.task),
                content: "{}".to_string(),
                mode: WriteMode::Replace,
            });
            let mut ctx = req.context.clone();
            ctx.output = Some(json!({ "task": req.task }));
            response.context = Some(ctx);
        }
        Ok(response)
    })
}

fn read_status(job: &TestJob, bucket: Bucket) -> StatusDoc {
    load_status(
        &job.paths.status(bucket, "j1"),
        "j1",
        "now",
    )
    .unwrap()
}

#[tokio::test]
async fn happy_path_completes_and_archives() {
    let job = setup(&["alpha", "beta"]);
    let deps = deps(producing_factory());

    let outcome = run_job(&config(&job), &deps).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    // moved out of current, into complete
    assert!(!job.job_dir.exists());
    let archived = job.paths.job_dir(Bucket::Complete, "j1");
    assert!(archived.is_dir());

    let doc = read_status(&job, Bucket::Complete);
    assert_eq!(doc.state, JobState::Complete);
    assert_eq!(doc.progress, 100);
    assert_eq!(doc.tasks["alpha"].state, TaskState::Done);
    assert_eq!(doc.tasks["beta"].state, TaskState::Done);
    assert_eq!(doc.tasks["alpha"].attempts, 1);
    assert!(doc.tasks["alpha"].execution_time_ms.is_some());

    // run journal carries the artifacts
    let journal = std::fs::read_to_string(job.paths.runs_journal()).unwrap();
    let summary: RunSummary = serde_json::from_str(journal.lines().next().unwrap()).unwrap();
    assert_eq!(summary.id, "j1");
    assert_eq!(summary.tasks, vec!["alpha", "beta"]);
    assert_eq!(
        summary.final_artifacts,
        vec!["alpha-output.json", "beta-output.json"]
    );

    // bridges swept from the archive
    assert!(!archived.join("tasks/alpha/files").exists());
    // outputs persisted for rehydration
    assert!(archived.join("tasks/alpha/output.json").exists());
}

#[tokio::test]
async fn validation_failure_keeps_job_in_current() {
    let job = setup(&["alpha"]);
    let factory = FakeExecutorFactory::new(|req| {
        if req.stage != Stage::Validation {
            return Ok(StageResponse::default());
        }
        if req.refinement_attempts == 0 {
            return Ok(StageResponse {
                ok: false,
                error: Some("bad output".to_string()),
                ..Default::default()
            });
        }
        let mut ctx = req.context.clone();
        ctx.flags.needs_refinement = true;
        Ok(StageResponse {
            context: Some(ctx),
            ..Default::default()
        })
    });
    let deps = deps(factory);

    let outcome = run_job(&config(&job), &deps).await.unwrap();
    assert_eq!(
        outcome,
        RunOutcome::Failed {
            task: "alpha".to_string()
        }
    );

    assert!(job.job_dir.is_dir());
    let doc = read_status(&job, Bucket::Current);
    assert_eq!(doc.state, JobState::Failed);
    assert_eq!(doc.tasks["alpha"].state, TaskState::Failed);
    assert_eq!(doc.tasks["alpha"].failed_stage, Some(Stage::Validation));
    assert_eq!(doc.tasks["alpha"].refinement_attempts, 2);
    assert!(doc.tasks["alpha"].error_context.is_some());

    assert!(job
        .job_dir
        .join("files/logs/alpha-validation-failure-details.json")
        .exists());
    assert!(job
        .job_dir
        .join("files/logs/alpha-validation-execution-logs.json")
        .exists());
}

#[tokio::test]
async fn restart_from_failed_task_rehydrates_upstream() {
    let job = setup(&["alpha", "beta"]);

    // alpha already done with an output snapshot; beta failed
    let writer = StatusWriter::system(Arc::new(NoopSink) as Arc<dyn EventSink>);
    writer
        .update_task(&job.job_dir, "alpha", |t| t.state = TaskState::Done)
        .await
        .unwrap();
    writer
        .update_task(&job.job_dir, "beta", |t| t.state = TaskState::Failed)
        .await
        .unwrap();
    std::fs::create_dir_all(job.job_dir.join("tasks/alpha")).unwrap();
    std::fs::write(
        job.job_dir.join("tasks/alpha/output.json"),
        r#"{"fromAlpha":7}"#,
    )
    .unwrap();

    let seen_upstream = Arc::new(parking_lot::Mutex::new(None::<Value>));
    let seen = seen_upstream.clone();
    let factory = FakeExecutorFactory::new(move |req| {
        if req.stage == Stage::Ingestion {
            *seen.lock() = Some(Value::Object(req.context.data.clone())["upstream"].clone());
        }
        Ok(StageResponse::default())
    });
    let deps = deps(factory);

    let mut cfg = config(&job);
    cfg.start_from_task = Some("beta".to_string());
    let outcome = run_job(&cfg, &deps).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    // alpha's output reached beta's ingestion context
    let upstream = seen_upstream.lock().clone().unwrap();
    assert_eq!(upstream["alpha"]["fromAlpha"], 7);

    let doc = read_status(&job, Bucket::Complete);
    assert_eq!(doc.tasks["alpha"].state, TaskState::Done);
    assert_eq!(doc.tasks["beta"].state, TaskState::Done);
}

#[tokio::test]
async fn single_task_mode_stops_after_target() {
    let job = setup(&["alpha", "beta"]);
    let deps = deps(producing_factory());

    let mut cfg = config(&job);
    cfg.start_from_task = Some("alpha".to_string());
    cfg.run_single_task = true;
    let outcome = run_job(&cfg, &deps).await.unwrap();
    assert_eq!(outcome, RunOutcome::SingleTask);

    // job not archived; beta untouched
    assert!(job.job_dir.is_dir());
    let doc = read_status(&job, Bucket::Current);
    assert_eq!(doc.tasks["alpha"].state, TaskState::Done);
    assert!(doc
        .tasks
        .get("beta")
        .map(|t| t.state == TaskState::Pending)
        .unwrap_or(true));
}

#[tokio::test]
async fn failed_task_without_restart_is_a_lifecycle_error() {
    let job = setup(&["alpha"]);
    let writer = StatusWriter::system(Arc::new(NoopSink) as Arc<dyn EventSink>);
    writer
        .update_task(&job.job_dir, "alpha", |t| t.state = TaskState::Failed)
        .await
        .unwrap();

    let sink = Arc::new(RecordingSink::new());
    let mut deps = deps(producing_factory());
    deps.sink = sink.clone();

    let err = run_job(&config(&job), &deps).await.unwrap_err();
    match err {
        EngineError::Lifecycle {
            task,
            reason,
            http_status,
            ..
        } => {
            assert_eq!(task, "alpha");
            assert_eq!(reason, BlockReason::AlreadyFailed);
            assert_eq!(http_status, 409);
        }
        other => panic!("expected lifecycle error, got {other}"),
    }
    assert!(sink.topics().contains(&Topic::LifecycleBlock));
}

#[tokio::test]
async fn start_from_later_task_blocks_on_unready_dependencies() {
    let job = setup(&["alpha", "beta"]);
    let deps = deps(producing_factory());

    let mut cfg = config(&job);
    cfg.start_from_task = Some("beta".to_string());
    let err = run_job(&cfg, &deps).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Lifecycle {
            reason: BlockReason::DependenciesNotReady,
            ..
        }
    ));
}

#[tokio::test]
async fn unknown_start_task_errors() {
    let job = setup(&["alpha"]);
    let deps = deps(producing_factory());
    let mut cfg = config(&job);
    cfg.start_from_task = Some("ghost".to_string());
    assert!(matches!(
        run_job(&cfg, &deps).await.unwrap_err(),
        EngineError::UnknownTask(_)
    ));
}

#[tokio::test]
async fn missing_registry_entry_marks_task_failed() {
    let job = setup(&["alpha"]);
    // Overwrite the registry without alpha.
    std::fs::write(&job.registry_path, "{}").unwrap();
    let deps = deps(producing_factory());

    let outcome = run_job(&config(&job), &deps).await.unwrap();
    assert_eq!(
        outcome,
        RunOutcome::Failed {
            task: "alpha".to_string()
        }
    );
    let doc = read_status(&job, Bucket::Current);
    assert_eq!(doc.tasks["alpha"].state, TaskState::Failed);
    let error = doc.tasks["alpha"].error.clone().unwrap();
    assert!(error.as_str().unwrap().contains("no entry"));
}

#[tokio::test]
async fn invalid_pipeline_snapshot_is_surfaced() {
    let job = setup(&["alpha"]);
    std::fs::write(job.job_dir.join("pipeline.json"), r#"{"name":"p1","tasks":[]}"#).unwrap();
    let deps = deps(producing_factory());

    let err = run_job(&config(&job), &deps).await.unwrap_err();
    assert!(err.to_string().contains("tasks is empty"));
}

#[test]
fn pid_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = write_pid_file(dir.path()).unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.trim().parse::<u32>().unwrap(), std::process::id());
    remove_pid_file(dir.path());
    assert!(!path.exists());
    // removing twice is fine
    remove_pid_file(dir.path());
}
