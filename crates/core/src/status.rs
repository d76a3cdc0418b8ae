// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-job status document (`tasks-status.json`).
//!
//! The document is the source of truth for a job's state. Unknown fields
//! at the root and per-task level are preserved verbatim through every
//! round-trip: the known fields are typed below, everything else flows
//! through `#[serde(flatten)]` maps. Normalization coerces only the
//! closed set of known fields and never strips extras.

use crate::stage::Stage;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Aggregate job state derived from its task states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Complete,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Complete => "complete",
            JobState::Failed => "failed",
        }
    }

    /// Sort precedence for aggregated listings: active work first.
    pub fn priority(&self) -> u8 {
        match self {
            JobState::Running => 0,
            JobState::Failed => 1,
            JobState::Pending => 2,
            JobState::Complete => 3,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one task within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Done,
    Failed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Done => "done",
            TaskState::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three kinds of per-task output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Artifacts,
    Logs,
    Tmp,
}

impl FileKind {
    pub const ALL: [FileKind; 3] = [FileKind::Artifacts, FileKind::Logs, FileKind::Tmp];

    /// Directory name under `{jobDir}/files/`.
    pub fn dir_name(&self) -> &'static str {
        match self {
            FileKind::Artifacts => "artifacts",
            FileKind::Logs => "logs",
            FileKind::Tmp => "tmp",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Ordered, de-duplicated file-name lists, kept at both job and task scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLists {
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub tmp: Vec<String>,
}

impl FileLists {
    pub fn list(&self, kind: FileKind) -> &[String] {
        match kind {
            FileKind::Artifacts => &self.artifacts,
            FileKind::Logs => &self.logs,
            FileKind::Tmp => &self.tmp,
        }
    }

    /// Append a name if not already present. Comparison is case-sensitive,
    /// as-is. Returns true when the name was newly added.
    pub fn push(&mut self, kind: FileKind, name: &str) -> bool {
        let list = match kind {
            FileKind::Artifacts => &mut self.artifacts,
            FileKind::Logs => &mut self.logs,
            FileKind::Tmp => &mut self.tmp,
        };
        if list.iter().any(|n| n == name) {
            return false;
        }
        list.push(name.to_string());
        true
    }

    pub fn contains(&self, kind: FileKind, name: &str) -> bool {
        self.list(kind).iter().any(|n| n == name)
    }
}

/// Record of one task's execution under a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub state: TaskState,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub refinement_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<Value>,
    #[serde(default)]
    pub files: FileLists,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for TaskRecord {
    fn default() -> Self {
        Self {
            state: TaskState::Pending,
            attempts: 0,
            refinement_attempts: 0,
            started_at: None,
            ended_at: None,
            current_stage: None,
            failed_stage: None,
            error: None,
            execution_time_ms: None,
            error_context: None,
            token_usage: None,
            files: FileLists::default(),
            extra: Map::new(),
        }
    }
}

impl TaskRecord {
    /// Reset the record to a runnable pending state. File lists are never
    /// touched; token usage is cleared only when asked.
    pub fn reset(&mut self, clear_token_usage: bool) {
        self.state = TaskState::Pending;
        self.attempts = 0;
        self.refinement_attempts = 0;
        self.started_at = None;
        self.ended_at = None;
        self.current_stage = None;
        self.failed_stage = None;
        self.error = None;
        self.execution_time_ms = None;
        self.error_context = None;
        if clear_token_usage {
            self.token_usage = None;
        }
    }
}

/// The status document. One per job, at `{jobDir}/tasks-status.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDoc {
    pub id: String,
    pub state: JobState,
    #[serde(default)]
    pub current: Option<String>,
    #[serde(default)]
    pub current_stage: Option<Stage>,
    #[serde(default)]
    pub progress: u8,
    pub last_updated: String,
    #[serde(default)]
    pub tasks: IndexMap<String, TaskRecord>,
    #[serde(default)]
    pub files: FileLists,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StatusDoc {
    /// The default shape used when the file is missing or corrupt.
    pub fn new(id: impl Into<String>, now_iso: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: JobState::Pending,
            current: None,
            current_stage: None,
            progress: 0,
            last_updated: now_iso.into(),
            tasks: IndexMap::new(),
            files: FileLists::default(),
            extra: Map::new(),
        }
    }

    /// Build a document from a free-form JSON tree, coercing only the
    /// closed set of known fields. Unknown fields pass through unchanged.
    /// Returns `None` when the tree is not an object (corrupt document).
    pub fn from_value(value: Value, fallback_id: &str, now_iso: &str) -> Option<StatusDoc> {
        let Value::Object(mut root) = value else {
            return None;
        };
        normalize_root(&mut root, fallback_id, now_iso);
        // Normalization pins the known fields to valid shapes, so the
        // typed parse can only fail on pathological nesting; treat that
        // as corruption too.
        serde_json::from_value(Value::Object(root)).ok()
    }

    /// Get-or-create a task record.
    pub fn ensure_task(&mut self, name: &str) -> &mut TaskRecord {
        self.tasks.entry(name.to_string()).or_default()
    }

    /// Recompute the derived fields (`state`, `progress`, `current`,
    /// `currentStage`) from task states. Called by every task-mutating
    /// operation; plain field updates deliberately skip it so untouched
    /// caller-supplied values survive round-trips.
    pub fn recompute(&mut self) {
        let total = self.tasks.len();
        let done = self
            .tasks
            .values()
            .filter(|t| t.state == TaskState::Done)
            .count();

        self.progress = if total == 0 {
            0
        } else {
            ((done as f64 / total as f64) * 100.0).round() as u8
        };

        let any_failed = self.tasks.values().any(|t| t.state == TaskState::Failed);
        let running = self
            .tasks
            .iter()
            .find(|(_, t)| t.state == TaskState::Running);

        self.state = if any_failed {
            JobState::Failed
        } else if running.is_some() {
            JobState::Running
        } else if total > 0 && done == total {
            JobState::Complete
        } else {
            JobState::Pending
        };

        match running {
            Some((name, task)) => {
                self.current = Some(name.clone());
                self.current_stage = task.current_stage;
            }
            None => {
                self.current = None;
                self.current_stage = None;
            }
        }
    }

    /// Record a file name in both the task-scoped and job-scoped lists,
    /// maintaining the subset invariant.
    pub fn mirror_file(&mut self, task: &str, kind: FileKind, name: &str) {
        self.ensure_task(task).files.push(kind, name);
        self.files.push(kind, name);
    }

    /// Reset every task at or after `from` in `order` (earlier tasks and
    /// all file lists untouched). Falls back to the document's own task
    /// insertion order when no pipeline order is supplied. Returns false
    /// if `from` was not found.
    pub fn reset_from_task(
        &mut self,
        from: &str,
        order: Option<&[String]>,
        clear_token_usage: bool,
    ) -> bool {
        let doc_order: Vec<String>;
        let order: &[String] = match order {
            Some(order) => order,
            None => {
                doc_order = self.tasks.keys().cloned().collect();
                &doc_order
            }
        };
        let Some(from_ix) = order.iter().position(|t| t == from) else {
            return false;
        };
        for name in &order[from_ix..] {
            if let Some(task) = self.tasks.get_mut(name) {
                task.reset(clear_token_usage);
            }
        }
        self.recompute();
        true
    }

    /// Reset all tasks to pending. File lists untouched.
    pub fn reset_all(&mut self, clear_token_usage: bool) {
        for task in self.tasks.values_mut() {
            task.reset(clear_token_usage);
        }
        self.recompute();
    }

    /// Reset one task only. Returns false if the task does not exist.
    pub fn reset_single(&mut self, name: &str, clear_token_usage: bool) -> bool {
        let Some(task) = self.tasks.get_mut(name) else {
            return false;
        };
        task.reset(clear_token_usage);
        self.recompute();
        true
    }
}

/// Coerce the known root fields in place, leaving everything else alone.
fn normalize_root(root: &mut Map<String, Value>, fallback_id: &str, now_iso: &str) {
    if !root.get("id").is_some_and(Value::is_string) {
        root.insert("id".into(), Value::from(fallback_id));
    }

    let state_ok = root
        .get("state")
        .and_then(Value::as_str)
        .is_some_and(|s| matches!(s, "pending" | "running" | "complete" | "failed"));
    if !state_ok {
        root.insert("state".into(), Value::from("pending"));
    }

    if let Some(v) = root.get("current") {
        if !v.is_string() && !v.is_null() {
            root.insert("current".into(), Value::Null);
        }
    }

    let stage_ok = |v: &Value| match v {
        Value::Null => true,
        Value::String(s) => Stage::parse(s).is_some(),
        _ => false,
    };
    if root.get("currentStage").is_some_and(|v| !stage_ok(v)) {
        root.insert("currentStage".into(), Value::Null);
    }

    let progress = root
        .get("progress")
        .and_then(Value::as_f64)
        .map(|p| p.round().clamp(0.0, 100.0) as u64)
        .unwrap_or(0);
    root.insert("progress".into(), Value::from(progress));

    if !root.get("lastUpdated").is_some_and(Value::is_string) {
        root.insert("lastUpdated".into(), Value::from(now_iso));
    }

    match root.get_mut("tasks") {
        Some(Value::Object(tasks)) => {
            for task in tasks.values_mut() {
                normalize_task(task);
            }
        }
        _ => {
            root.insert("tasks".into(), Value::Object(Map::new()));
        }
    }

    normalize_files(root);
}

/// Coerce one task record's known fields.
fn normalize_task(task: &mut Value) {
    if !task.is_object() {
        *task = serde_json::json!({ "state": "pending" });
        return;
    }
    let Some(obj) = task.as_object_mut() else {
        return;
    };

    let state_ok = obj
        .get("state")
        .and_then(Value::as_str)
        .is_some_and(|s| matches!(s, "pending" | "running" | "done" | "failed"));
    if !state_ok {
        obj.insert("state".into(), Value::from("pending"));
    }

    for counter in ["attempts", "refinementAttempts"] {
        if let Some(v) = obj.get(counter) {
            let n = v.as_f64().map(|n| n.round().max(0.0) as u64);
            match n {
                Some(n) => {
                    obj.insert(counter.into(), Value::from(n));
                }
                None => {
                    obj.insert(counter.into(), Value::from(0u64));
                }
            }
        }
    }

    for stage_field in ["currentStage", "failedStage"] {
        let valid = match obj.get(stage_field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => Stage::parse(s).is_some(),
            Some(_) => false,
        };
        if !valid {
            obj.insert(stage_field.into(), Value::Null);
        }
    }

    if let Some(v) = obj.get("executionTimeMs") {
        if !v.is_null() && v.as_u64().is_none() {
            let coerced = v.as_f64().map(|n| n.round().max(0.0) as u64);
            obj.insert("executionTimeMs".into(), coerced.map_or(Value::Null, Value::from));
        }
    }

    normalize_files(obj);
}

/// Ensure `files` is an object of string arrays (for both root and task).
fn normalize_files(obj: &mut Map<String, Value>) {
    let files = obj
        .entry("files".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !files.is_object() {
        *files = Value::Object(Map::new());
    }
    let Some(files) = files.as_object_mut() else {
        return;
    };
    for kind in FileKind::ALL {
        let list = files
            .entry(kind.dir_name().to_string())
            .or_insert_with(|| Value::Array(vec![]));
        match list {
            Value::Array(items) => items.retain(Value::is_string),
            _ => *list = Value::Array(vec![]),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
