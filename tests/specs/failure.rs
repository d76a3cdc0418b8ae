//! S2: refinement exhaustion fails the task at validation and leaves
//! the job in current.

use crate::prelude::*;
use serde_json::json;

#[test]
fn refinement_exhaustion_leaves_job_failed_in_current() {
    let f = Fixture::new();
    f.add_pipeline("p1", &["alpha"]);
    f.add_task("alpha", UNVALIDATABLE_SCRIPT);
    f.submit_seed("s2job", &json!({ "name": "s2", "data": {}, "pipeline": "p1" }));

    let output = f.relayd_once();
    // The manager itself succeeds even though the job failed.
    assert!(output.status.success(), "relayd --once failed: {output:?}");

    assert!(f.job_dir("current", "s2job").is_dir());
    assert!(!f.job_dir("complete", "s2job").exists());

    let status = f.status("current", "s2job");
    assert_eq!(status["state"], "failed");
    assert_eq!(status["tasks"]["alpha"]["state"], "failed");
    assert_eq!(status["tasks"]["alpha"]["failedStage"], "validation");
    assert_eq!(status["tasks"]["alpha"]["refinementAttempts"], 2);

    let logs_dir = f.job_dir("current", "s2job").join("files/logs");
    assert!(logs_dir
        .join("alpha-validation-failure-details.json")
        .exists());
    assert!(logs_dir
        .join("alpha-validation-execution-logs.json")
        .exists());

    let details: serde_json::Value = serde_json::from_slice(
        &std::fs::read(logs_dir.join("alpha-validation-failure-details.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(details["failedStage"], "validation");
    assert_eq!(details["refinementAttempts"], 2);
    assert!(details["error"]
        .as_str()
        .unwrap()
        .contains("schema mismatch"));
}

#[test]
fn failed_run_exits_one_and_removes_pid_file() {
    let f = Fixture::new();
    f.add_pipeline("p1", &["alpha"]);
    f.add_task("alpha", UNVALIDATABLE_SCRIPT);
    f.promote_manually("direct", "p1", &["alpha"]);

    let output = f.runner_cmd("direct").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(!f.job_dir("current", "direct").join("runner.pid").exists());

    let status = f.status("current", "direct");
    assert_eq!(status["state"], "failed");
}

#[test]
fn rerunning_a_failed_job_is_a_lifecycle_error() {
    let f = Fixture::new();
    f.add_pipeline("p1", &["alpha"]);
    f.add_task("alpha", UNVALIDATABLE_SCRIPT);
    f.promote_manually("again", "p1", &["alpha"]);
    f.set_task_state("again", "alpha", "failed");

    let output = f.runner_cmd("again").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported_lifecycle"), "stderr: {stderr}");
    assert!(stderr.contains("already_failed"), "stderr: {stderr}");
}
