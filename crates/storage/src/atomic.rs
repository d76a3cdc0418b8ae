// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-atomic file writes.
//!
//! `atomic_write` stages content in a uniquely-suffixed sibling temp file
//! and renames it over the target, so concurrent readers observe either
//! the old or the new content, never a partial write. Rename atomicity is
//! the only durability primitive this system relies on; a cross-device
//! rename cannot be atomic and is a hard error.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors from atomic write operations.
#[derive(Debug, Error)]
pub enum AtomicWriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cross-device rename from {tmp} to {target} (temp and target must share a filesystem)")]
    CrossDevice { tmp: String, target: String },
    #[error("target path {0} has no parent directory")]
    NoParent(String),
}

/// Write `bytes` to `path` atomically: temp sibling → flush → rename.
/// The temp file is removed if any step fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), AtomicWriteError> {
    let parent = path
        .parent()
        .ok_or_else(|| AtomicWriteError::NoParent(path.display().to_string()))?;
    fs::create_dir_all(parent)?;

    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("file");
    let tmp = parent.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));

    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        match fs::rename(&tmp, path) {
            Ok(()) => Ok(()),
            Err(e) if e.raw_os_error() == Some(libc_exdev()) => {
                Err(AtomicWriteError::CrossDevice {
                    tmp: tmp.display().to_string(),
                    target: path.display().to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Append `bytes` plus a trailing newline to `path`, creating parent
/// directories as needed. Appends are not atomic across crashes, but a
/// single `write_all` of one line is not interleaved with concurrent
/// appenders on POSIX append-mode files.
pub fn append_line(path: &Path, bytes: &[u8]) -> Result<(), AtomicWriteError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut line = Vec::with_capacity(bytes.len() + 1);
    line.extend_from_slice(bytes);
    line.push(b'\n');
    file.write_all(&line)?;
    Ok(())
}

/// `EXDEV` without pulling in libc: the value is 18 on every platform we
/// support (Linux and macOS agree).
const fn libc_exdev() -> i32 {
    18
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
