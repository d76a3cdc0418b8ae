// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! relay - operator CLI for the Relay pipeline orchestrator

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod output;
mod table;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{daemon, list, prune, reset, show, stop, submit};
use output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "relay",
    version,
    about = "Relay - filesystem-backed pipeline job orchestrator"
)]
struct Cli {
    /// Output format
    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value_t,
        global = true
    )]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a seed file into the pending bucket
    Submit(submit::SubmitArgs),
    /// List jobs across buckets
    List(list::ListArgs),
    /// Show one job's status document and metadata
    Show(show::ShowArgs),
    /// Signal a job's runner to stop
    Stop(stop::StopArgs),
    /// Reset task state (all, from a task, or a single task)
    Reset(reset::ResetArgs),
    /// Delete a job directory permanently
    Prune(prune::PruneArgs),
    /// Lifecycle manager control
    Daemon(daemon::DaemonArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Submit(args) => submit::run(args, cli.output),
        Commands::List(args) => list::run(args, cli.output),
        Commands::Show(args) => show::run(args, cli.output),
        Commands::Stop(args) => stop::run(args),
        Commands::Reset(args) => reset::run(args).await,
        Commands::Prune(args) => prune::run(args),
        Commands::Daemon(args) => daemon::run(args),
    }
}
