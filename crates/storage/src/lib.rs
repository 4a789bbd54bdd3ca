// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk persistence: `instances.json`, `solutions.json`,
//! `groups/<groupId>.json`.
//!
//! Every write is atomic (sibling temp file + rename). Reads are lock-free;
//! write serialization is provided by the rename itself.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod atomic;
mod groups;
mod instances;
mod schema;
mod solutions;

pub use atomic::write_atomic;
pub use groups::GroupStorage;
pub use instances::InstanceStorage;
pub use solutions::SolutionStorage;

use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl From<StorageError> for ea_core::Error {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidRecord(msg) => ea_core::Error::Validation(msg),
            other => ea_core::Error::Internal(other.to_string()),
        }
    }
}
