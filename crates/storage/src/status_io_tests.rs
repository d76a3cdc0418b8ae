// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use relay_core::{JobState, TaskState};
use tempfile::tempdir;

#[test]
fn missing_file_yields_default_shape() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tasks-status.json");
    let doc = load_status(&path, "j1", "now").unwrap();
    assert_eq!(doc.id, "j1");
    assert_eq!(doc.state, JobState::Pending);
    assert!(doc.tasks.is_empty());
    assert_eq!(doc.last_updated, "now");
}

#[test]
fn corrupt_file_yields_default_shape() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tasks-status.json");
    std::fs::write(&path, b"{not json").unwrap();
    let doc = load_status(&path, "j1", "now").unwrap();
    assert_eq!(doc.state, JobState::Pending);
}

#[test]
fn non_object_json_yields_default_shape() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tasks-status.json");
    std::fs::write(&path, b"[1,2,3]").unwrap();
    let doc = load_status(&path, "j1", "now").unwrap();
    assert_eq!(doc.id, "j1");
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tasks-status.json");

    let mut doc = StatusDoc::new("j1", "t0");
    doc.ensure_task("alpha").state = TaskState::Done;
    doc.ensure_task("beta").state = TaskState::Running;
    doc.recompute();
    save_status(&path, &doc).unwrap();

    let loaded = load_status(&path, "j1", "t1").unwrap();
    assert_eq!(loaded, doc);
    // lastUpdated came from the saved doc, not the load-time fallback
    assert_eq!(loaded.last_updated, "t0");
}
