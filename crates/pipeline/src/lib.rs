// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline construction: solution template + request + instance id →
//! an ordered, attached chain of typed node handles.
//!
//! The builder is pure apart from a one-time process bootstrap. Nodes are
//! opaque to the rest of the control plane: lifecycle methods and parameter
//! mutation only.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod builder;
mod input;
mod models;
mod node;
mod params;

pub use builder::{bootstrap, build_pipeline, BuildError};
pub use input::{detect_input_type, InputType};
pub use models::{list_available_models, resolve_model_by_name, resolve_model_path};
pub use node::{
    DestinationNode, InferenceNode, NodeKind, OsdNode, Pipeline, PipelineNode, SourceNode,
};
pub use params::{clamp_resize_ratio, clamp_threshold, parse_finite};
