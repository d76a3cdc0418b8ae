// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod daemon;
pub mod list;
pub mod prune;
pub mod reset;
pub mod show;
pub mod stop;
pub mod submit;

use anyhow::{anyhow, Result};
use relay_storage::DataPaths;
use std::path::PathBuf;

/// Resolve the data root the same way the daemon does.
pub fn data_root() -> Result<PathBuf> {
    relay_daemon::env::data_root()
        .ok_or_else(|| anyhow!("cannot determine data root (set RELAY_DATA_ROOT or HOME)"))
}

/// Path resolver for the current environment.
pub fn paths() -> Result<DataPaths> {
    Ok(relay_daemon::env::data_paths(&data_root()?))
}
