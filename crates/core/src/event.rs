// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change events broadcast after state commits.
//!
//! The writer and lifecycle manager publish through the [`EventSink`]
//! seam; the daemon's topic bus fans events out to external subscribers.
//! Delivery is best-effort: a sink must never fail back into a publisher.

use crate::policy::{BlockReason, LifecycleOp};
use crate::status::TaskRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Topics carried by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    StateChange,
    TaskUpdated,
    LifecycleBlock,
    SeedUploaded,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::StateChange,
        Topic::TaskUpdated,
        Topic::LifecycleBlock,
        Topic::SeedUploaded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::StateChange => "state:change",
            Topic::TaskUpdated => "task:updated",
            Topic::LifecycleBlock => "lifecycle_block",
            Topic::SeedUploaded => "seed:uploaded",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change event published after a successful state commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum BusEvent {
    /// A job's status document committed.
    #[serde(rename = "state:change")]
    StateChange {
        job_id: String,
        path: PathBuf,
        timestamp: String,
    },
    /// One task record changed.
    #[serde(rename = "task:updated")]
    TaskUpdated {
        job_id: String,
        task_id: String,
        task: TaskRecord,
    },
    /// The lifecycle policy refused an operation.
    #[serde(rename = "lifecycle_block")]
    LifecycleBlock {
        job_id: String,
        task_id: String,
        op: LifecycleOp,
        reason: BlockReason,
    },
    /// A seed arrived in the pending bucket.
    #[serde(rename = "seed:uploaded")]
    SeedUploaded { name: String },
}

impl BusEvent {
    pub fn topic(&self) -> Topic {
        match self {
            BusEvent::StateChange { .. } => Topic::StateChange,
            BusEvent::TaskUpdated { .. } => Topic::TaskUpdated,
            BusEvent::LifecycleBlock { .. } => Topic::LifecycleBlock,
            BusEvent::SeedUploaded { .. } => Topic::SeedUploaded,
        }
    }
}

/// Fire-and-forget event publication.
///
/// Implementations must not block and must swallow their own failures;
/// the status writer's commit path never observes an emission error.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: BusEvent);
}

/// Sink that drops everything (plumbing-free callers, e.g. the CLI).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn publish(&self, _event: BusEvent) {}
}

/// Sink that records events for assertions.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: parking_lot::Mutex<Vec<BusEvent>>,
}

#[cfg(any(test, feature = "test-support"))]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BusEvent> {
        self.events.lock().clone()
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.events.lock().iter().map(BusEvent::topic).collect()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl EventSink for RecordingSink {
    fn publish(&self, event: BusEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
