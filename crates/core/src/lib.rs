// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core domain model for the edge-AI control plane.
//!
//! Instance records, create/update requests, solution templates, groups,
//! the shared error taxonomy, and centralized environment access. No I/O
//! lives here; persistence and transport are separate crates.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod error;
mod group;
mod id;
mod instance;
mod request;
mod solution;

pub mod env;

pub use error::Error;
pub use group::{validate_group_id, validate_group_name, GroupInfo, DEFAULT_GROUP_ID};
pub use id::{looks_like_uuid, new_instance_id, validate_instance_id};
pub use instance::{
    DetectionSensitivity, InstanceInfo, InstanceStatistics, SensorModality, MAX_DISPLAY_NAME_LEN,
    MAX_FRAME_RATE_LIMIT, MAX_INPUT_ORIENTATION,
};
pub use request::{CreateInstanceRequest, UpdateInstanceRequest};
pub use solution::{substitute, NodeConfig, SolutionConfig, INSTANCE_ID_TOKEN};
