// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seed documents: the input payload a job is created from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Maximum length of a seed's display name.
pub const MAX_NAME_LEN: usize = 120;

/// Why a seed failed validation.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("seed is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("seed name is empty")]
    EmptyName,
    #[error("seed name exceeds {MAX_NAME_LEN} characters (got {0})")]
    NameTooLong(usize),
    #[error("seed name contains non-printable character {0:?}")]
    NameNotPrintable(char),
    #[error("seed pipeline {0:?} is not present in the registry")]
    UnknownPipeline(String),
}

/// A job's input payload, dropped into the pending bucket as
/// `{jobId}-seed.json`. Unknown root fields are rejected outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Seed {
    /// Display name (≤120 printable characters).
    pub name: String,
    /// Arbitrary task input.
    pub data: Map<String, Value>,
    /// Pipeline identifier; must exist in the pipeline registry.
    pub pipeline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

impl Seed {
    /// Parse a seed and check its shape. Registry membership is checked
    /// separately via [`Seed::check_pipeline`], since the submitting
    /// boundary may not have the registry at hand.
    pub fn from_slice(bytes: &[u8]) -> Result<Seed, SeedError> {
        let seed: Seed = serde_json::from_slice(bytes)?;
        seed.check_shape()?;
        Ok(seed)
    }

    /// Validate the intrinsic fields (name length/printability).
    pub fn check_shape(&self) -> Result<(), SeedError> {
        if self.name.is_empty() {
            return Err(SeedError::EmptyName);
        }
        let len = self.name.chars().count();
        if len > MAX_NAME_LEN {
            return Err(SeedError::NameTooLong(len));
        }
        if let Some(c) = self.name.chars().find(|c| c.is_control()) {
            return Err(SeedError::NameNotPrintable(c));
        }
        Ok(())
    }

    /// Validate that the referenced pipeline exists.
    pub fn check_pipeline(&self, exists: impl Fn(&str) -> bool) -> Result<(), SeedError> {
        if exists(&self.pipeline) {
            Ok(())
        } else {
            Err(SeedError::UnknownPipeline(self.pipeline.clone()))
        }
    }
}

#[cfg(test)]
#[path = "seed_tests.rs"]
mod tests;
