// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker runtime: one process, one instance, one pipeline.
//!
//! The worker hosts the IPC server its supervisor connects to, builds and
//! runs the instance's pipeline, applies hot config changes (in place where
//! possible, via pre-built hot swap otherwise), and reports status,
//! statistics, and the last frame on request.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod frame;
mod handler;
mod runtime;
mod update;
mod watcher;

pub use frame::{FpsWindow, FrameCache, FrameData};
pub use handler::WorkerHandler;
pub use runtime::{run, WorkerArgs};
pub use update::{plan_update, UpdatePlan};
pub use watcher::ConfigFileWatcher;
