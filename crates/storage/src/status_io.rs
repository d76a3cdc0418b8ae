// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loading and saving status documents.
//!
//! A missing or corrupt file yields the default document shape; corruption
//! is logged once per load so a damaged job surfaces in the daemon log
//! without failing the write that repairs it.

use crate::atomic::{atomic_write, AtomicWriteError};
use relay_core::StatusDoc;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Errors from status document I/O.
#[derive(Debug, Error)]
pub enum StatusIoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Atomic(#[from] AtomicWriteError),
}

/// Load the status document at `path`, defaulting when missing or corrupt.
///
/// `fallback_id` seeds the default document's `id`; `now_iso` its
/// `lastUpdated`. Read errors other than not-found are real failures.
pub fn load_status(
    path: &Path,
    fallback_id: &str,
    now_iso: &str,
) -> Result<StatusDoc, StatusIoError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(StatusDoc::new(fallback_id, now_iso));
        }
        Err(e) => return Err(e.into()),
    };

    let value: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "corrupt status document, starting from default shape"
            );
            return Ok(StatusDoc::new(fallback_id, now_iso));
        }
    };

    match StatusDoc::from_value(value, fallback_id, now_iso) {
        Some(doc) => Ok(doc),
        None => {
            warn!(
                path = %path.display(),
                "status document is not a JSON object, starting from default shape"
            );
            Ok(StatusDoc::new(fallback_id, now_iso))
        }
    }
}

/// Serialize and atomically write the document.
pub fn save_status(path: &Path, doc: &StatusDoc) -> Result<(), StatusIoError> {
    let mut bytes = serde_json::to_vec_pretty(doc)?;
    bytes.push(b'\n');
    atomic_write(path, &bytes)?;
    Ok(())
}

#[cfg(test)]
#[path = "status_io_tests.rs"]
mod tests;
