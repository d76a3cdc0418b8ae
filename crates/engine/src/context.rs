// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The mutable context a task's stages operate on.

use relay_core::{LogEvent, Stage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stage-visible flags. `needsRefinement` drives the refine back-edge;
/// anything else a task sets is carried along untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flags {
    #[serde(default)]
    pub needs_refinement: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The data bag exchanged with a task's stages.
///
/// `data`, `flags`, and `output` belong to the task: a stage may replace
/// them wholesale by returning a new context. The stage log and the
/// previous/current stage markers are owned by the stage runner and
/// travel alongside in each request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskContext {
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub flags: Flags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

/// One entry of a task's stage log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageLogRecord {
    pub stage: Stage,
    pub event: LogEvent,
    /// Milliseconds spent in the stage (zero on the entry record).
    pub ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
