// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance id generation and validation.

use uuid::Uuid;

/// Minimum length of a valid instance id (hyphenated UUID).
const MIN_INSTANCE_ID_LEN: usize = 36;

/// Generate a fresh hyphenated UUID instance id.
pub fn new_instance_id() -> String {
    Uuid::new_v4().to_string()
}

/// Whether a persisted top-level key looks like a UUID (TensorRT model ids,
/// zone ids, and similar opaque sections are keyed this way).
pub fn looks_like_uuid(key: &str) -> bool {
    key.len() >= MIN_INSTANCE_ID_LEN && key.contains('-')
}

/// Validate an instance id: UUID-shaped, hyphen-separated, ≥ 36 chars.
pub fn validate_instance_id(id: &str) -> Result<(), crate::Error> {
    if id.len() < MIN_INSTANCE_ID_LEN || !id.contains('-') {
        return Err(crate::Error::validation(format!("invalid instance id: {id:?}")));
    }
    if !id.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        return Err(crate::Error::validation(format!("invalid instance id: {id:?}")));
    }
    Ok(())
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
