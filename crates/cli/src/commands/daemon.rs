// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relay daemon` — lifecycle manager control.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use std::path::PathBuf;

#[derive(clap::Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start relayd in the background
    Start,
    /// Run one intake pass in the foreground and wait for its jobs
    Once,
    /// Signal the running relayd to stop
    Stop,
    /// Report whether relayd is running
    Status,
}

pub fn run(args: DaemonArgs) -> Result<()> {
    let data_root = super::data_root()?;
    let lock_path = data_root.join("relayd.lock");

    match args.command {
        DaemonCommand::Start => {
            let child = std::process::Command::new(daemon_bin())
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .spawn()
                .context("cannot start relayd")?;
            println!("relayd starting (pid {})", child.id());
            Ok(())
        }
        DaemonCommand::Once => {
            let status = std::process::Command::new(daemon_bin())
                .arg("--once")
                .status()
                .context("cannot run relayd --once")?;
            if !status.success() {
                bail!("relayd --once failed: {status}");
            }
            Ok(())
        }
        DaemonCommand::Stop => {
            let pid = read_pid(&lock_path)?;
            nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid),
                nix::sys::signal::Signal::SIGTERM,
            )
            .with_context(|| format!("cannot signal relayd pid {pid}"))?;
            println!("sent SIGTERM to relayd (pid {pid})");
            Ok(())
        }
        DaemonCommand::Status => {
            match read_pid(&lock_path) {
                Ok(pid) if process_alive(pid) => println!("relayd running (pid {pid})"),
                _ => println!("relayd not running"),
            }
            Ok(())
        }
    }
}

fn daemon_bin() -> PathBuf {
    if let Ok(bin) = std::env::var("RELAY_DAEMON_BIN") {
        return PathBuf::from(bin);
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("relayd")))
        .unwrap_or_else(|| PathBuf::from("relayd"))
}

fn read_pid(lock_path: &std::path::Path) -> Result<i32> {
    let content =
        std::fs::read_to_string(lock_path).context("relayd lock file not found; not running?")?;
    content
        .trim()
        .parse::<i32>()
        .context("relayd lock file holds no pid")
}

fn process_alive(pid: i32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}
