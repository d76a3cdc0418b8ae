// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relay prune` — permanently delete a job.
//!
//! Prune is the only way a job is ever destroyed; every other transition
//! moves it between buckets.

use anyhow::{bail, Result};
use relay_core::Bucket;

#[derive(clap::Args)]
pub struct PruneArgs {
    /// Job id to delete
    pub job_id: String,

    /// Bucket to delete from (default: search current, then complete)
    #[arg(long)]
    pub bucket: Option<Bucket>,

    /// Actually delete (required)
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: PruneArgs) -> Result<()> {
    if !args.force {
        bail!("refusing to delete without --force");
    }
    let paths = super::paths()?;

    let candidates: Vec<Bucket> = match args.bucket {
        Some(bucket) => vec![bucket],
        None => vec![Bucket::Current, Bucket::Complete],
    };

    for bucket in candidates {
        if bucket.is_flat() {
            let seed = paths.seed(bucket, &args.job_id);
            if seed.exists() {
                std::fs::remove_file(&seed)?;
                let reason = paths.rejection_reason(&args.job_id);
                if reason.exists() {
                    std::fs::remove_file(&reason)?;
                }
                println!("pruned {} from {bucket}", args.job_id);
                return Ok(());
            }
        } else {
            let job_dir = paths.job_dir(bucket, &args.job_id);
            if job_dir.is_dir() {
                if job_dir.join("runner.pid").exists() {
                    bail!("job {} has a live runner; stop it first", args.job_id);
                }
                std::fs::remove_dir_all(&job_dir)?;
                println!("pruned {} from {bucket}", args.job_id);
                return Ok(());
            }
        }
    }
    bail!("job {} not found", args.job_id);
}
