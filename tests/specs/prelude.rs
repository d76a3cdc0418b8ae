//! Test helpers for behavioral specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use serde_json::{json, Value};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Returns the path to a workspace binary, resolving relative to the
/// test executable (target/debug/deps/specs-<hash>) when the manifest
/// dir points elsewhere.
pub fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

/// A task script that succeeds every stage and, at finalization, emits
/// `{task}-output.json` plus a task output value.
pub const PRODUCER_SCRIPT: &str = r#"
while read -r line; do
  case "$line" in
    *'"stage":"finalization"'*)
      printf '{"ok":true,"context":{"data":{},"flags":{},"output":{"producedBy":"%s"}},"files":[{"kind":"artifact","name":"%s-output.json","content":"{}","mode":"replace"}]}\n' "$RELAY_TASK" "$RELAY_TASK"
      ;;
    *)
      printf '{"ok":true}\n'
      ;;
  esac
done
"#;

/// A task whose validation throws on the first call and requests
/// refinement on every retry — it can never pass validation.
pub const UNVALIDATABLE_SCRIPT: &str = r#"
while read -r line; do
  case "$line" in
    *'"stage":"validation"'*)
      case "$line" in
        *'"refinementAttempts":0'*)
          printf '{"ok":false,"error":"schema mismatch"}\n'
          ;;
        *)
          printf '{"ok":true,"context":{"data":{},"flags":{"needsRefinement":true}}}\n'
          ;;
      esac
      ;;
    *)
      printf '{"ok":true}\n'
      ;;
  esac
done
"#;

/// One isolated data root with a pipeline/task registry.
pub struct Fixture {
    _dir: TempDir,
    pub data_root: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let data_root = dir.path().to_path_buf();
        std::fs::create_dir_all(data_root.join("config/pipelines")).unwrap();
        std::fs::write(data_root.join("config/tasks.json"), "{}").unwrap();
        for bucket in ["pending", "current", "complete", "rejected"] {
            std::fs::create_dir_all(data_root.join("pipeline-data").join(bucket)).unwrap();
        }
        Self {
            _dir: dir,
            data_root,
        }
    }

    pub fn pipeline_data(&self) -> PathBuf {
        self.data_root.join("pipeline-data")
    }

    pub fn job_dir(&self, bucket: &str, job_id: &str) -> PathBuf {
        self.pipeline_data().join(bucket).join(job_id)
    }

    /// Register a pipeline definition.
    pub fn add_pipeline(&self, slug: &str, tasks: &[&str]) {
        let def = json!({ "name": slug, "tasks": tasks });
        std::fs::write(
            self.data_root
                .join("config/pipelines")
                .join(format!("{slug}.json")),
            serde_json::to_vec_pretty(&def).unwrap(),
        )
        .unwrap();
    }

    /// Register a task backed by a shell co-process script. The script
    /// sees its own name as `$RELAY_TASK`.
    pub fn add_task(&self, name: &str, script: &str) {
        let bin_dir = self.data_root.join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();
        let bin = bin_dir.join(format!("{name}.sh"));
        std::fs::write(&bin, format!("#!/bin/sh\n{script}\n")).unwrap();
        let mut perms = std::fs::metadata(&bin).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&bin, perms).unwrap();

        let registry_path = self.data_root.join("config/tasks.json");
        let mut registry: Value =
            serde_json::from_slice(&std::fs::read(&registry_path).unwrap()).unwrap();
        registry[name] = json!({
            "binary": bin,
            "env": { "RELAY_TASK": name }
        });
        std::fs::write(&registry_path, serde_json::to_vec_pretty(&registry).unwrap()).unwrap();
    }

    /// Drop a seed file into the pending bucket.
    pub fn submit_seed(&self, job_id: &str, body: &Value) {
        std::fs::write(
            self.pipeline_data()
                .join("pending")
                .join(format!("{job_id}-seed.json")),
            serde_json::to_vec(body).unwrap(),
        )
        .unwrap();
    }

    /// Apply the fixture environment to a command.
    pub fn env(&self, cmd: &mut Command) {
        cmd.env("RELAY_DATA_ROOT", &self.data_root)
            .env("RELAY_RUNNER_BIN", binary_path("relay-runner"))
            .env("RELAY_DAEMON_BIN", binary_path("relayd"))
            .env_remove("RELAY_DATA_DIR")
            .env_remove("RELAY_CURRENT_DIR")
            .env_remove("RELAY_COMPLETE_DIR")
            .env_remove("RELAY_START_FROM_TASK")
            .env_remove("RELAY_RUN_SINGLE_TASK");
    }

    /// Run one lifecycle-manager pass: promote seeds, run jobs, wait.
    pub fn relayd_once(&self) -> Output {
        let mut cmd = Command::new(binary_path("relayd"));
        self.env(&mut cmd);
        cmd.arg("--once").output().unwrap()
    }

    /// A `relay-runner <job>` command ready to run.
    pub fn runner_cmd(&self, job_id: &str) -> Command {
        let mut cmd = Command::new(binary_path("relay-runner"));
        self.env(&mut cmd);
        cmd.arg(job_id);
        cmd
    }

    /// A `relay <args...>` CLI command ready to run.
    pub fn cli_cmd(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(binary_path("relay"));
        self.env(&mut cmd);
        cmd.args(args);
        cmd
    }

    /// Parse a job's status document from one bucket.
    pub fn status(&self, bucket: &str, job_id: &str) -> Value {
        let path = self.job_dir(bucket, job_id).join("tasks-status.json");
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap()
    }

    /// Manually place a job in the current bucket, bypassing intake.
    pub fn promote_manually(&self, job_id: &str, pipeline_slug: &str, tasks: &[&str]) {
        let job_dir = self.job_dir("current", job_id);
        std::fs::create_dir_all(job_dir.join("tasks")).unwrap();
        for kind in ["artifacts", "logs", "tmp"] {
            std::fs::create_dir_all(job_dir.join("files").join(kind)).unwrap();
        }
        std::fs::write(
            job_dir.join("seed.json"),
            serde_json::to_vec(&json!({
                "name": format!("seed for {job_id}"),
                "data": {},
                "pipeline": pipeline_slug
            }))
            .unwrap(),
        )
        .unwrap();
        std::fs::write(
            job_dir.join("pipeline.json"),
            serde_json::to_vec(&json!({ "name": pipeline_slug, "tasks": tasks })).unwrap(),
        )
        .unwrap();

        let task_records: serde_json::Map<String, Value> = tasks
            .iter()
            .map(|t| (t.to_string(), json!({ "state": "pending" })))
            .collect();
        std::fs::write(
            job_dir.join("tasks-status.json"),
            serde_json::to_vec(&json!({
                "id": job_id,
                "state": "pending",
                "progress": 0,
                "lastUpdated": "1970-01-01T00:00:00.000Z",
                "tasks": task_records,
                "files": { "artifacts": [], "logs": [], "tmp": [] }
            }))
            .unwrap(),
        )
        .unwrap();
    }

    /// Overwrite one task's record in a current job's status document.
    pub fn set_task_state(&self, job_id: &str, task: &str, state: &str) {
        let path = self.job_dir("current", job_id).join("tasks-status.json");
        let mut doc: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        doc["tasks"][task]["state"] = json!(state);
        std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();
    }
}
