// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log filename grammar: `{taskName}-{stage}-{event}.{ext}`.
//!
//! Log names carry their own metadata, so observers can scan a job's
//! `files.logs` list and classify every entry without opening it. The
//! event and extension sets are closed; the task-IO facade rejects any
//! log write whose name does not parse, and rejects artifact/tmp writes
//! whose names do.

use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Closed set of log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogEvent {
    Start,
    Complete,
    Error,
    Context,
    Debug,
    Metrics,
    PipelineStart,
    PipelineComplete,
    PipelineError,
    ExecutionLogs,
    FailureDetails,
}

impl LogEvent {
    /// All events, longest name first so suffix matching is unambiguous
    /// (`pipeline-complete` must match before `complete`).
    pub const ALL: [LogEvent; 11] = [
        LogEvent::PipelineComplete,
        LogEvent::ExecutionLogs,
        LogEvent::FailureDetails,
        LogEvent::PipelineStart,
        LogEvent::PipelineError,
        LogEvent::Complete,
        LogEvent::Context,
        LogEvent::Metrics,
        LogEvent::Start,
        LogEvent::Error,
        LogEvent::Debug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogEvent::Start => "start",
            LogEvent::Complete => "complete",
            LogEvent::Error => "error",
            LogEvent::Context => "context",
            LogEvent::Debug => "debug",
            LogEvent::Metrics => "metrics",
            LogEvent::PipelineStart => "pipeline-start",
            LogEvent::PipelineComplete => "pipeline-complete",
            LogEvent::PipelineError => "pipeline-error",
            LogEvent::ExecutionLogs => "execution-logs",
            LogEvent::FailureDetails => "failure-details",
        }
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allowed log file extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogExt {
    Log,
    Json,
}

impl LogExt {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogExt::Log => "log",
            LogExt::Json => "json",
        }
    }
}

impl fmt::Display for LogExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from log-name formatting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogNameError {
    #[error("log name does not match {{task}}-{{stage}}-{{event}}.{{log|json}}: {0:?}")]
    Unparseable(String),
    #[error("log name task segment is empty: {0:?}")]
    EmptyTask(String),
}

/// A parsed log filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogName {
    pub task: String,
    pub stage: Stage,
    pub event: LogEvent,
    pub ext: LogExt,
}

impl LogName {
    pub fn new(task: impl Into<String>, stage: Stage, event: LogEvent, ext: LogExt) -> Self {
        Self {
            task: task.into(),
            stage,
            event,
            ext,
        }
    }

    /// Parse a filename against the grammar. Task names may themselves
    /// contain dashes, so the stage and event are matched from the right.
    pub fn parse(name: &str) -> Result<LogName, LogNameError> {
        let unparseable = || LogNameError::Unparseable(name.to_string());

        let (rest, ext) = match name.rsplit_once('.') {
            Some((rest, "log")) => (rest, LogExt::Log),
            Some((rest, "json")) => (rest, LogExt::Json),
            _ => return Err(unparseable()),
        };

        let (rest, event) = LogEvent::ALL
            .into_iter()
            .find_map(|ev| {
                rest.strip_suffix(ev.as_str())
                    .and_then(|r| r.strip_suffix('-'))
                    .map(|r| (r, ev))
            })
            .ok_or_else(unparseable)?;

        // Longest stage names first so `pre-processing` wins over any
        // shorter accidental suffix.
        let mut stages = Stage::SEQUENCE;
        stages.sort_by_key(|s| std::cmp::Reverse(s.as_str().len()));
        let (task, stage) = stages
            .into_iter()
            .find_map(|st| {
                rest.strip_suffix(st.as_str())
                    .and_then(|r| r.strip_suffix('-'))
                    .map(|r| (r, st))
            })
            .ok_or_else(unparseable)?;

        if task.is_empty() {
            return Err(LogNameError::EmptyTask(name.to_string()));
        }

        Ok(LogName {
            task: task.to_string(),
            stage,
            event,
            ext,
        })
    }

    /// Whether a filename parses under the log grammar.
    pub fn matches(name: &str) -> bool {
        LogName::parse(name).is_ok()
    }
}

impl fmt::Display for LogName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}.{}", self.task, self.stage, self.event, self.ext)
    }
}

#[cfg(test)]
#[path = "logname_tests.rs"]
mod tests;
