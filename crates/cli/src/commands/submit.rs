// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relay submit` — drop a seed into the pending bucket.

use crate::output::OutputFormat;
use anyhow::{bail, Context, Result};
use relay_core::{Bucket, JobId};
use relay_manifest::Seed;
use relay_storage::atomic_write;
use std::path::PathBuf;

#[derive(clap::Args)]
pub struct SubmitArgs {
    /// Seed JSON file to submit
    pub seed_file: PathBuf,

    /// Job id (minted when omitted)
    #[arg(long)]
    pub id: Option<String>,
}

pub fn run(args: SubmitArgs, output: OutputFormat) -> Result<()> {
    let bytes = std::fs::read(&args.seed_file)
        .with_context(|| format!("cannot read {}", args.seed_file.display()))?;
    // Validate the shape up front; pipeline membership is checked by the
    // lifecycle manager at promotion time.
    let seed = Seed::from_slice(&bytes).context("invalid seed")?;

    let job_id = match args.id {
        Some(id) => {
            JobId::check(&id).map_err(|e| anyhow::anyhow!("invalid job id: {e}"))?;
            id
        }
        None => JobId::mint().to_string(),
    };

    let paths = super::paths()?;
    let dest = paths.seed(Bucket::Pending, &job_id);
    if dest.exists() {
        bail!("a pending seed for job {job_id} already exists");
    }
    atomic_write(&dest, &bytes)?;

    match output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "jobId": job_id, "name": seed.name, "pipeline": seed.pipeline })
        ),
        OutputFormat::Text => println!("submitted {job_id} ({})", seed.name),
    }
    Ok(())
}
