// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relay reset` — drive the status writer's reset operations.

use anyhow::{bail, Result};
use relay_core::{Bucket, NoopSink};
use relay_manifest::PipelineDef;
use relay_storage::StatusWriter;
use std::sync::Arc;

#[derive(clap::Args)]
pub struct ResetArgs {
    /// Job id
    pub job_id: String,

    /// Reset this task and every task after it in pipeline order
    #[arg(long, conflicts_with_all = ["task", "all"])]
    pub from_task: Option<String>,

    /// Reset exactly one task
    #[arg(long, conflicts_with_all = ["from_task", "all"])]
    pub task: Option<String>,

    /// Reset every task
    #[arg(long, conflicts_with_all = ["from_task", "task"])]
    pub all: bool,

    /// Also clear recorded token usage
    #[arg(long)]
    pub clear_token_usage: bool,
}

pub async fn run(args: ResetArgs) -> Result<()> {
    let paths = super::paths()?;
    let job_dir = paths.job_dir(Bucket::Current, &args.job_id);
    if !job_dir.is_dir() {
        bail!("job {} is not in the current bucket", args.job_id);
    }
    if job_dir.join("runner.pid").exists() {
        bail!("job {} has a live runner; stop it first", args.job_id);
    }

    let writer = StatusWriter::system(Arc::new(NoopSink));

    let doc = if let Some(from) = args.from_task {
        // Resets walk the pipeline's task order, not the document's.
        let order = PipelineDef::load(&job_dir.join("pipeline.json"))
            .ok()
            .map(|p| p.tasks);
        writer
            .reset_from_task(&job_dir, &from, order, args.clear_token_usage)
            .await?
    } else if let Some(task) = args.task {
        writer
            .reset_single_task(&job_dir, &task, args.clear_token_usage)
            .await?
    } else if args.all {
        writer
            .reset_clean_slate(&job_dir, args.clear_token_usage)
            .await?
    } else {
        bail!("specify --from-task <task>, --task <task>, or --all");
    };

    println!(
        "reset {}: state={} progress={}%",
        args.job_id, doc.state, doc.progress
    );
    Ok(())
}
