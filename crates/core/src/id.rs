// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors from job id validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("job id is empty")]
    Empty,
    #[error("job id contains invalid character {0:?} (allowed: [A-Za-z0-9_-])")]
    InvalidChar(char),
}

/// Opaque identifier for a job.
///
/// Valid ids match `[A-Za-z0-9_-]+`. The id doubles as the job's directory
/// name inside a bucket, so the character set is deliberately filesystem-safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Validate and wrap a job id.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        Self::check(&id)?;
        Ok(Self(id))
    }

    /// Mint a fresh random job id.
    pub fn mint() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Check whether a string is a valid job id.
    pub fn check(id: &str) -> Result<(), IdError> {
        if id.is_empty() {
            return Err(IdError::Empty);
        }
        match id
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != '-')
        {
            Some(c) => Err(IdError::InvalidChar(c)),
            None => Ok(()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for JobId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for JobId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
