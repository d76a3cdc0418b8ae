//! S1: two tasks succeed first try; the job lands in complete.

use crate::prelude::*;
use serde_json::json;

#[test]
fn two_task_pipeline_completes_end_to_end() {
    let f = Fixture::new();
    f.add_pipeline("p1", &["alpha", "beta"]);
    f.add_task("alpha", PRODUCER_SCRIPT);
    f.add_task("beta", PRODUCER_SCRIPT);
    f.submit_seed("s1job", &json!({ "name": "s1", "data": { "x": 1 }, "pipeline": "p1" }));

    let output = f.relayd_once();
    assert!(output.status.success(), "relayd --once failed: {output:?}");

    // The job directory moved from current to complete.
    assert!(!f.job_dir("current", "s1job").exists());
    assert!(f.job_dir("complete", "s1job").is_dir());

    let status = f.status("complete", "s1job");
    assert_eq!(status["state"], "complete");
    assert_eq!(status["progress"], 100);
    assert_eq!(status["tasks"]["alpha"]["state"], "done");
    assert_eq!(status["tasks"]["beta"]["state"], "done");
    assert_eq!(status["tasks"]["alpha"]["attempts"], 1);
    assert!(status["current"].is_null());
    assert!(status["currentStage"].is_null());

    // Artifacts exist on disk and in both status lists.
    let artifacts = f.job_dir("complete", "s1job").join("files/artifacts");
    assert!(artifacts.join("alpha-output.json").exists());
    assert!(artifacts.join("beta-output.json").exists());
    let job_artifacts: Vec<String> =
        serde_json::from_value(status["files"]["artifacts"].clone()).unwrap();
    assert!(job_artifacts.contains(&"alpha-output.json".to_string()));
    assert!(job_artifacts.contains(&"beta-output.json".to_string()));

    // One runs.jsonl line summarizing the run.
    let journal = std::fs::read_to_string(f.pipeline_data().join("complete/runs.jsonl")).unwrap();
    let lines: Vec<&str> = journal.lines().collect();
    assert_eq!(lines.len(), 1);
    let summary: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(summary["id"], "s1job");
    assert_eq!(summary["tasks"], json!(["alpha", "beta"]));
    let final_artifacts: Vec<String> =
        serde_json::from_value(summary["finalArtifacts"].clone()).unwrap();
    assert!(final_artifacts.contains(&"alpha-output.json".to_string()));

    // Task bridges were swept from the archive; outputs remain.
    assert!(!f
        .job_dir("complete", "s1job")
        .join("tasks/alpha/files")
        .exists());
    assert!(f
        .job_dir("complete", "s1job")
        .join("tasks/alpha/output.json")
        .exists());

    // PID file cleaned up on exit.
    assert!(!f
        .job_dir("complete", "s1job")
        .join("runner.pid")
        .exists());
}

#[test]
fn downstream_task_sees_upstream_output() {
    let f = Fixture::new();
    f.add_pipeline("p1", &["alpha", "beta"]);
    f.add_task("alpha", PRODUCER_SCRIPT);
    // beta fails unless alpha's output is visible in its ingestion
    // context.
    f.add_task(
        "beta",
        r#"
while read -r line; do
  case "$line" in
    *'"stage":"ingestion"'*)
      case "$line" in
        *'"producedBy":"alpha"'*) printf '{"ok":true}\n' ;;
        *) printf '{"ok":false,"error":"upstream output missing"}\n' ;;
      esac
      ;;
    *) printf '{"ok":true}\n' ;;
  esac
done
"#,
    );
    f.submit_seed("updown", &json!({ "name": "s", "data": {}, "pipeline": "p1" }));

    let output = f.relayd_once();
    assert!(output.status.success());
    let status = f.status("complete", "updown");
    assert_eq!(status["state"], "complete");
}
