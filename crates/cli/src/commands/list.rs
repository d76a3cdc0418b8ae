// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relay list` — aggregate job listing across buckets.

use crate::output::{format_progress, format_timestamp, OutputFormat};
use crate::table::Table;
use anyhow::Result;
use relay_core::Bucket;
use relay_storage::{aggregate_jobs, list_jobs, read_job, JobView};

#[derive(clap::Args)]
pub struct ListArgs {
    /// Restrict to one bucket (default: current + complete, current wins)
    #[arg(long)]
    pub bucket: Option<Bucket>,
}

pub fn run(args: ListArgs, output: OutputFormat) -> Result<()> {
    let paths = super::paths()?;

    let views = match args.bucket {
        Some(bucket) => read_all(&paths, bucket),
        None => {
            let current = read_all(&paths, Bucket::Current);
            let complete = read_all(&paths, Bucket::Complete);
            aggregate_jobs(current, complete)
        }
    };

    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
        OutputFormat::Text => {
            let mut table = Table::new(vec!["ID", "STATE", "PROGRESS", "BUCKET", "CREATED"]);
            for view in &views {
                table.row(vec![
                    view.id.clone(),
                    view.status.state.to_string(),
                    format_progress(view.status.progress),
                    view.bucket.to_string(),
                    format_timestamp(
                        view.meta.as_ref().map(|m| m.created_at.as_str()).unwrap_or(""),
                    ),
                ]);
            }
            if table.is_empty() {
                println!("no jobs");
            } else {
                print!("{}", table.render());
            }
        }
    }
    Ok(())
}

fn read_all(paths: &relay_storage::DataPaths, bucket: Bucket) -> Vec<JobView> {
    list_jobs(paths, bucket)
        .into_iter()
        .filter_map(|id| read_job(paths, &id, Some(bucket)).ok())
        .collect()
}
