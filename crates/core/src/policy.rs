// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle policy: the pure decision table gating task transitions.
//!
//! Decisions have no side effects. Callers translate rejections into
//! structured errors (the pipeline runner surfaces them as 409-style
//! `unsupported_lifecycle` failures).

use crate::status::TaskState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operations gated by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleOp {
    Start,
    Restart,
    Reset,
    Pause,
    Resume,
}

impl fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleOp::Start => "start",
            LifecycleOp::Restart => "restart",
            LifecycleOp::Reset => "reset",
            LifecycleOp::Pause => "pause",
            LifecycleOp::Resume => "resume",
        };
        f.write_str(s)
    }
}

/// Why an operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    AlreadyRunning,
    AlreadyDone,
    AlreadyFailed,
    DependenciesNotReady,
    NeverStarted,
    NotRunning,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlockReason::AlreadyRunning => "already_running",
            BlockReason::AlreadyDone => "already_done",
            BlockReason::AlreadyFailed => "already_failed",
            BlockReason::DependenciesNotReady => "dependencies_not_ready",
            BlockReason::NeverStarted => "never_started",
            BlockReason::NotRunning => "not_running",
        };
        f.write_str(s)
    }
}

/// Input to a policy decision.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput {
    pub op: LifecycleOp,
    pub task_state: TaskState,
    pub dependencies_ready: bool,
}

/// Outcome of a policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub ok: bool,
    pub reason: Option<BlockReason>,
}

impl Decision {
    const OK: Decision = Decision {
        ok: true,
        reason: None,
    };

    fn blocked(reason: BlockReason) -> Decision {
        Decision {
            ok: false,
            reason: Some(reason),
        }
    }
}

/// Decide the legality of an operation given the task's current state.
pub fn decide(input: PolicyInput) -> Decision {
    match input.op {
        LifecycleOp::Start => match input.task_state {
            TaskState::Pending if input.dependencies_ready => Decision::OK,
            TaskState::Pending => Decision::blocked(BlockReason::DependenciesNotReady),
            TaskState::Running => Decision::blocked(BlockReason::AlreadyRunning),
            TaskState::Done => Decision::blocked(BlockReason::AlreadyDone),
            TaskState::Failed => Decision::blocked(BlockReason::AlreadyFailed),
        },
        LifecycleOp::Restart => match input.task_state {
            TaskState::Done | TaskState::Failed => Decision::OK,
            TaskState::Pending | TaskState::Running => {
                Decision::blocked(BlockReason::NeverStarted)
            }
        },
        // Reset is an explicit operator action; always legal.
        LifecycleOp::Reset => Decision::OK,
        LifecycleOp::Pause => match input.task_state {
            TaskState::Running => Decision::OK,
            _ => Decision::blocked(BlockReason::NotRunning),
        },
        LifecycleOp::Resume => match input.task_state {
            TaskState::Pending => Decision::OK,
            TaskState::Running => Decision::blocked(BlockReason::AlreadyRunning),
            TaskState::Done => Decision::blocked(BlockReason::AlreadyDone),
            TaskState::Failed => Decision::blocked(BlockReason::AlreadyFailed),
        },
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
