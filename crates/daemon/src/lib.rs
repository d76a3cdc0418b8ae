// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! relay-daemon: The job lifecycle manager.
//!
//! `relayd` is the long-lived parent process: it watches the pending
//! bucket, validates and promotes seeds, spawns one `relay-runner`
//! subprocess per job (bounded by a global cap), supervises child exits,
//! and fans change events out over the topic bus. A root-level lockfile
//! guarantees one manager per data root.

pub mod bus;
pub mod env;
pub mod intake;
pub mod lifecycle;
pub mod supervisor;

pub use bus::EventBus;
pub use intake::Intake;
pub use lifecycle::{Config, DaemonError};
pub use supervisor::{signal_runner, Supervisor};
