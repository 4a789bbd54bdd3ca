// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance groups.

use serde::{Deserialize, Serialize};

use crate::Error;

/// The built-in group every ungrouped instance belongs to.
pub const DEFAULT_GROUP_ID: &str = "default";

/// A named collection of instances.
///
/// Default groups cannot be deleted; non-empty groups cannot be deleted;
/// read-only groups cannot be modified. The instance count is derived from
/// the instance manager's records, never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupInfo {
    pub group_id: String,
    pub display_name: String,
    pub description: String,
    pub is_default: bool,
    pub read_only: bool,
    #[serde(skip)]
    pub instance_count: usize,
}

/// Group ids match `^[A-Za-z0-9_-]+$`.
pub fn validate_group_id(id: &str) -> Result<(), Error> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(Error::validation(format!("invalid group id: {id:?}")));
    }
    Ok(())
}

/// Group display names match `^[A-Za-z0-9 _-]+$`.
pub fn validate_group_name(name: &str) -> Result<(), Error> {
    if name.is_empty()
        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '_' || c == '-')
    {
        return Err(Error::validation(format!("invalid group name: {name:?}")));
    }
    Ok(())
}

#[cfg(test)]
#[path = "group_tests.rs"]
mod tests;
