// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle bucket directories.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four filesystem lifecycle directories a job can live in.
///
/// A job exists in exactly one bucket at any completed-write boundary:
/// seeds wait in `pending`, active and failed jobs live in `current`,
/// successful jobs are archived to `complete`, and seeds that fail
/// validation land in `rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Pending,
    Current,
    Complete,
    Rejected,
}

impl Bucket {
    /// All buckets, in lifecycle order.
    pub const ALL: [Bucket; 4] = [
        Bucket::Pending,
        Bucket::Current,
        Bucket::Complete,
        Bucket::Rejected,
    ];

    /// Directory name under the pipeline-data root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Bucket::Pending => "pending",
            Bucket::Current => "current",
            Bucket::Complete => "complete",
            Bucket::Rejected => "rejected",
        }
    }

    /// Whether jobs in this bucket are stored as flat seed files rather
    /// than per-job directories.
    pub fn is_flat(&self) -> bool {
        matches!(self, Bucket::Pending | Bucket::Rejected)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl std::str::FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Bucket::Pending),
            "current" => Ok(Bucket::Current),
            "complete" => Ok(Bucket::Complete),
            "rejected" => Ok(Bucket::Rejected),
            other => Err(format!("unknown bucket: {other}")),
        }
    }
}

#[cfg(test)]
#[path = "bucket_tests.rs"]
mod tests;
