// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::ValueEnum;

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Render `progress` as `"42%"`.
pub fn format_progress(progress: u8) -> String {
    format!("{progress}%")
}

/// Shorten an ISO-8601 timestamp to its date and time, dropping the
/// sub-second tail.
pub fn format_timestamp(iso: &str) -> String {
    if iso.is_empty() {
        return "-".to_string();
    }
    iso.split('.').next().unwrap_or(iso).replace('T', " ")
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
