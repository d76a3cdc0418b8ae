// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relay show` — one job's status document and metadata.

use crate::output::{format_progress, format_timestamp, OutputFormat};
use anyhow::Result;
use relay_core::Bucket;
use relay_storage::read_job;

#[derive(clap::Args)]
pub struct ShowArgs {
    /// Job id
    pub job_id: String,

    /// Bucket to read from (default: current, then complete)
    #[arg(long)]
    pub bucket: Option<Bucket>,
}

pub fn run(args: ShowArgs, output: OutputFormat) -> Result<()> {
    let paths = super::paths()?;
    let view = read_job(&paths, &args.job_id, args.bucket)?;

    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        OutputFormat::Text => {
            println!("job:      {}", view.id);
            if let Some(meta) = &view.meta {
                println!("name:     {}", meta.name);
                println!("pipeline: {}", meta.pipeline);
                println!("created:  {}", format_timestamp(&meta.created_at));
            }
            println!("bucket:   {}", view.bucket);
            println!("state:    {}", view.status.state);
            println!("progress: {}", format_progress(view.status.progress));
            if let Some(current) = &view.status.current {
                let stage = view
                    .status
                    .current_stage
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("current:  {current} ({stage})");
            }
            println!("updated:  {}", format_timestamp(&view.status.last_updated));
            println!();
            for (name, task) in &view.status.tasks {
                let mut line = format!("  {name}: {}", task.state);
                if let Some(stage) = task.failed_stage {
                    line.push_str(&format!(" at {stage}"));
                }
                if task.refinement_attempts > 0 {
                    line.push_str(&format!(" ({} refinements)", task.refinement_attempts));
                }
                println!("{line}");
            }
        }
    }
    Ok(())
}
