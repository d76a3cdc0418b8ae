// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relay stop` — signal a job's runner via its PID file.

use anyhow::{Context, Result};
use relay_daemon::signal_runner;

#[derive(clap::Args)]
pub struct StopArgs {
    /// Job id whose runner should stop
    pub job_id: String,
}

pub fn run(args: StopArgs) -> Result<()> {
    let paths = super::paths()?;
    let pid = signal_runner(&paths, &args.job_id)
        .with_context(|| format!("cannot stop job {}", args.job_id))?;
    println!("sent SIGTERM to runner {pid} for job {}", args.job_id);
    Ok(())
}
