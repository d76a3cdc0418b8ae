//! CLI round trips: submit, list, show, reset.

use crate::prelude::*;
use assert_cmd::prelude::*;
use serde_json::json;

#[test]
fn submit_then_run_then_list_and_show() {
    let f = Fixture::new();
    f.add_pipeline("p1", &["alpha"]);
    f.add_task("alpha", PRODUCER_SCRIPT);

    // submit writes the seed into the pending bucket
    let seed_file = f.data_root.join("my-seed.json");
    std::fs::write(
        &seed_file,
        serde_json::to_vec(&json!({ "name": "cli job", "data": {}, "pipeline": "p1" })).unwrap(),
    )
    .unwrap();
    f.cli_cmd(&["submit", seed_file.to_str().unwrap(), "--id", "cli1"])
        .assert()
        .success();
    assert!(f.pipeline_data().join("pending/cli1-seed.json").exists());

    f.relayd_once().assert().success();

    // list -o json sees the completed job
    let output = f.cli_cmd(&["list", "-o", "json"]).output().unwrap();
    assert!(output.status.success());
    let views: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = views
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["cli1"]);
    assert_eq!(views[0]["status"]["state"], "complete");
    assert_eq!(views[0]["bucket"], "complete");

    // show finds it without naming the bucket
    let output = f.cli_cmd(&["show", "cli1", "-o", "json"]).output().unwrap();
    assert!(output.status.success());
    let view: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(view["meta"]["name"], "cli job");
    assert_eq!(view["status"]["progress"], 100);
}

#[test]
fn submit_rejects_malformed_seed() {
    let f = Fixture::new();
    let seed_file = f.data_root.join("bad.json");
    std::fs::write(&seed_file, b"{\"name\":\"x\"}").unwrap();

    f.cli_cmd(&["submit", seed_file.to_str().unwrap()])
        .assert()
        .failure();
    // nothing landed in pending
    let pending: Vec<_> = std::fs::read_dir(f.pipeline_data().join("pending"))
        .unwrap()
        .collect();
    assert!(pending.is_empty());
}

#[test]
fn reset_from_task_reopens_later_tasks() {
    let f = Fixture::new();
    f.add_pipeline("p1", &["alpha", "beta"]);
    f.promote_manually("resetme", "p1", &["alpha", "beta"]);
    f.set_task_state("resetme", "alpha", "done");
    f.set_task_state("resetme", "beta", "done");

    f.cli_cmd(&["reset", "resetme", "--from-task", "beta"])
        .assert()
        .success();

    let status = f.status("current", "resetme");
    assert_eq!(status["tasks"]["alpha"]["state"], "done");
    assert_eq!(status["tasks"]["beta"]["state"], "pending");
    assert_eq!(status["progress"], 50);
}

#[test]
fn stop_without_runner_reports_error() {
    let f = Fixture::new();
    f.cli_cmd(&["stop", "ghost"]).assert().failure();
}
