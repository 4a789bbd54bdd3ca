// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error taxonomy.
//!
//! Domain kinds, not transport codes. The HTTP boundary (out of scope here)
//! maps these onto status codes; the core only ever speaks in kinds.

use thiserror::Error;

/// Domain error surfaced by the instance manager contract and its
/// collaborators. Crate-local errors convert into one of these kinds at the
/// boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Invalid id format, out-of-range field, malformed URL, unknown enum
    /// value, missing required field.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown instance, solution, or group id; missing model file.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate instance or group id.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Modification of a read-only entity, deletion of a default entity,
    /// deletion of a non-empty group.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Socket connect/IO failure, frame-decode failure, timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// Spawn failure, premature exit, heartbeat timeout, retry limit.
    #[error("worker error: {0}")]
    Subprocess(String),

    /// Unknown node type, missing model at runtime, node construction
    /// failure.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// Uncategorized; logged in full, surfaced with an opaque message.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}
