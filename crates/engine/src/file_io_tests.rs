// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use relay_core::NoopSink;
use tempfile::tempdir;

fn facade(job_dir: &std::path::Path) -> TaskFiles {
    let writer = StatusWriter::system(Arc::new(NoopSink));
    TaskFiles::new(job_dir, "alpha", writer)
}

#[tokio::test]
async fn artifact_write_mirrors_into_both_scopes() {
    let dir = tempdir().unwrap();
    let job_dir = dir.path().join("j1");
    let files = facade(&job_dir);

    files
        .write_artifact("out.json", b"{}", WriteMode::Replace)
        .await
        .unwrap();

    assert!(job_dir.join("files/artifacts/out.json").exists());
    let doc = relay_storage::load_status(&job_dir.join("tasks-status.json"), "j1", "now").unwrap();
    assert_eq!(doc.files.artifacts, vec!["out.json"]);
    assert_eq!(doc.tasks["alpha"].files.artifacts, vec!["out.json"]);
}

#[tokio::test]
async fn artifact_rejects_log_shaped_names() {
    let dir = tempdir().unwrap();
    let files = facade(&dir.path().join("j1"));

    let err = files
        .write_artifact("alpha-validation-error.log", b"x", WriteMode::Replace)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LogShapedName { kind: "artifact", .. }));
}

#[tokio::test]
async fn log_requires_grammar_and_matching_task() {
    let dir = tempdir().unwrap();
    let job_dir = dir.path().join("j1");
    let files = facade(&job_dir);

    files
        .write_log("alpha-invocation-start.log", b"go", WriteMode::Replace)
        .await
        .unwrap();
    let doc = relay_storage::load_status(&job_dir.join("tasks-status.json"), "j1", "now").unwrap();
    assert_eq!(doc.files.logs, vec!["alpha-invocation-start.log"]);

    let err = files
        .write_log("not-a-log.txt", b"x", WriteMode::Replace)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LogName(_)));

    let err = files
        .write_log("beta-invocation-start.log", b"x", WriteMode::Replace)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LogTaskMismatch { .. }));
}

#[tokio::test]
async fn tmp_rejects_log_shaped_names() {
    let dir = tempdir().unwrap();
    let files = facade(&dir.path().join("j1"));

    let err = files
        .write_tmp("alpha-parsing-debug.log", b"x", WriteMode::Replace)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LogShapedName { kind: "tmp", .. }));

    files
        .write_tmp("scratch.txt", b"x", WriteMode::Replace)
        .await
        .unwrap();
}

#[tokio::test]
async fn append_mode_accumulates() {
    let dir = tempdir().unwrap();
    let job_dir = dir.path().join("j1");
    let files = facade(&job_dir);

    files
        .write_log("alpha-invocation-debug.log", b"one", WriteMode::Append)
        .await
        .unwrap();
    files
        .write_log("alpha-invocation-debug.log", b"two", WriteMode::Append)
        .await
        .unwrap();

    let content = files.read_log("alpha-invocation-debug.log").unwrap();
    assert_eq!(content, b"one\ntwo\n");

    // de-duplicated in the lists despite two writes
    let doc = relay_storage::load_status(&job_dir.join("tasks-status.json"), "j1", "now").unwrap();
    assert_eq!(doc.files.logs.len(), 1);
}

#[tokio::test]
async fn reads_do_not_touch_status() {
    let dir = tempdir().unwrap();
    let job_dir = dir.path().join("j1");
    let files = facade(&job_dir);

    files
        .write_artifact("out.json", b"{}", WriteMode::Replace)
        .await
        .unwrap();
    let before = std::fs::read(job_dir.join("tasks-status.json")).unwrap();

    files.read_artifact("out.json").unwrap();
    assert!(files.read_artifact("missing.json").is_err());

    let after = std::fs::read(job_dir.join("tasks-status.json")).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn note_stage_updates_task_record() {
    let dir = tempdir().unwrap();
    let job_dir = dir.path().join("j1");
    let files = facade(&job_dir);

    files.note_stage(Some(Stage::Parsing)).await.unwrap();
    assert_eq!(files.stage(), Some(Stage::Parsing));

    let doc = relay_storage::load_status(&job_dir.join("tasks-status.json"), "j1", "now").unwrap();
    assert_eq!(doc.tasks["alpha"].current_stage, Some(Stage::Parsing));
}

#[tokio::test]
async fn directives_route_by_kind() {
    let dir = tempdir().unwrap();
    let job_dir = dir.path().join("j1");
    let files = facade(&job_dir);

    files
        .apply(&FileDirective {
            kind: DirectiveKind::Artifact,
            name: "a.json".to_string(),
            content: "{}".to_string(),
            mode: WriteMode::Replace,
        })
        .await
        .unwrap();
    files
        .apply(&FileDirective {
            kind: DirectiveKind::Log,
            name: "alpha-finalization-complete.json".to_string(),
            content: "{}".to_string(),
            mode: WriteMode::Replace,
        })
        .await
        .unwrap();

    assert!(job_dir.join("files/artifacts/a.json").exists());
    assert!(job_dir
        .join("files/logs/alpha-finalization-complete.json")
        .exists());
}
