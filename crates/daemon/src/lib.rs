// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane daemon: worker supervision and instance management.
//!
//! The instance manager contract has two interchangeable backends — one
//! running pipelines in this process, one isolating each instance in a
//! worker subprocess behind the supervisor — selected by a small factory
//! from the environment.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod groups;
pub mod manager;
pub mod supervisor;

pub use groups::GroupRegistry;
pub use manager::{
    create_manager, BatchItem, BatchResult, InProcessManager, InstanceManager, SubprocessManager,
};
pub use supervisor::{SupervisorConfig, WorkerState, WorkerSupervisor};
