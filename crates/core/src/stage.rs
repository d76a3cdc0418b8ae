// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The fixed stage sequence every task executes.
//!
//! Stages form a table-driven state machine: a linear chain from
//! `ingestion` to `finalization`, with one back-edge from `validation`
//! through `refinement` to `prompt-assembly`, guarded by the task's
//! refinement budget.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the eight fixed sub-steps inside a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Ingestion,
    PreProcessing,
    PromptAssembly,
    Invocation,
    Parsing,
    Validation,
    Refinement,
    Finalization,
}

impl Stage {
    /// The full stage sequence, in execution order.
    pub const SEQUENCE: [Stage; 8] = [
        Stage::Ingestion,
        Stage::PreProcessing,
        Stage::PromptAssembly,
        Stage::Invocation,
        Stage::Parsing,
        Stage::Validation,
        Stage::Refinement,
        Stage::Finalization,
    ];

    /// Successor on the normal (non-refining) path.
    ///
    /// `validation` advances to `finalization`; the refine back-edge is
    /// taken explicitly by the stage runner when the validation outcome
    /// requests it. `refinement` always jumps back to `prompt-assembly`.
    pub fn successor(&self) -> Option<Stage> {
        match self {
            Stage::Ingestion => Some(Stage::PreProcessing),
            Stage::PreProcessing => Some(Stage::PromptAssembly),
            Stage::PromptAssembly => Some(Stage::Invocation),
            Stage::Invocation => Some(Stage::Parsing),
            Stage::Parsing => Some(Stage::Validation),
            Stage::Validation => Some(Stage::Finalization),
            Stage::Refinement => Some(Stage::PromptAssembly),
            Stage::Finalization => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingestion => "ingestion",
            Stage::PreProcessing => "pre-processing",
            Stage::PromptAssembly => "prompt-assembly",
            Stage::Invocation => "invocation",
            Stage::Parsing => "parsing",
            Stage::Validation => "validation",
            Stage::Refinement => "refinement",
            Stage::Finalization => "finalization",
        }
    }

    pub fn parse(s: &str) -> Option<Stage> {
        Stage::SEQUENCE.into_iter().find(|st| st.as_str() == s)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "stage_tests.rs"]
mod tests;
