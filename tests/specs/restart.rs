//! S3: restart from a failed task skips completed work and finishes the
//! job.

use crate::prelude::*;
use serde_json::json;

#[test]
fn restart_from_failed_task_completes_the_job() {
    let f = Fixture::new();
    f.add_pipeline("p1", &["alpha", "beta"]);
    f.add_task("alpha", PRODUCER_SCRIPT);
    f.add_task("beta", PRODUCER_SCRIPT);

    f.promote_manually("s3job", "p1", &["alpha", "beta"]);
    f.set_task_state("s3job", "alpha", "done");
    f.set_task_state("s3job", "beta", "failed");
    let alpha_dir = f.job_dir("current", "s3job").join("tasks/alpha");
    std::fs::create_dir_all(&alpha_dir).unwrap();
    std::fs::write(alpha_dir.join("output.json"), r#"{"producedBy":"alpha"}"#).unwrap();

    let output = f
        .runner_cmd("s3job")
        .env("RELAY_START_FROM_TASK", "beta")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "runner failed: {output:?}");

    // alpha untouched, beta re-ran, job archived.
    let status = f.status("complete", "s3job");
    assert_eq!(status["state"], "complete");
    assert_eq!(status["progress"], 100);
    assert_eq!(status["tasks"]["alpha"]["state"], "done");
    assert_eq!(status["tasks"]["beta"]["state"], "done");
    // alpha was skipped: no attempts were recorded for it
    assert_eq!(status["tasks"]["alpha"]["attempts"], 0);
    assert_eq!(status["tasks"]["beta"]["attempts"], 1);
}

#[test]
fn single_task_mode_runs_one_task_and_stays_in_current() {
    let f = Fixture::new();
    f.add_pipeline("p1", &["alpha", "beta"]);
    f.add_task("alpha", PRODUCER_SCRIPT);
    f.add_task("beta", PRODUCER_SCRIPT);
    f.promote_manually("solo", "p1", &["alpha", "beta"]);

    let output = f
        .runner_cmd("solo")
        .env("RELAY_START_FROM_TASK", "alpha")
        .env("RELAY_RUN_SINGLE_TASK", "1")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));

    assert!(f.job_dir("current", "solo").is_dir());
    let status = f.status("current", "solo");
    assert_eq!(status["tasks"]["alpha"]["state"], "done");
    assert_eq!(status["tasks"]["beta"]["state"], "pending");
    assert_eq!(status["progress"], 50);
}

#[test]
fn start_from_with_pending_dependencies_is_blocked() {
    let f = Fixture::new();
    f.add_pipeline("p1", &["alpha", "beta"]);
    f.add_task("alpha", PRODUCER_SCRIPT);
    f.add_task("beta", PRODUCER_SCRIPT);
    f.promote_manually("blocked", "p1", &["alpha", "beta"]);

    let output = f
        .runner_cmd("blocked")
        .env("RELAY_START_FROM_TASK", "beta")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("dependencies_not_ready"), "stderr: {stderr}");
}
