// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Group persistence: one `groups/<groupId>.json` file per group.

use std::path::{Path, PathBuf};

use tracing::warn;

use ea_core::{validate_group_id, GroupInfo};

use crate::atomic::write_atomic;
use crate::StorageError;

pub struct GroupStorage {
    dir: PathBuf,
}

impl GroupStorage {
    pub fn new(dir: &Path) -> Self {
        GroupStorage { dir: dir.join("groups") }
    }

    fn file_path(&self, group_id: &str) -> PathBuf {
        self.dir.join(format!("{group_id}.json"))
    }

    pub fn save(&self, group: &GroupInfo) -> Result<(), StorageError> {
        validate_group_id(&group.group_id)
            .map_err(|e| StorageError::InvalidRecord(e.to_string()))?;
        let bytes = serde_json::to_vec_pretty(group)?;
        write_atomic(&self.file_path(&group.group_id), &bytes)?;
        Ok(())
    }

    pub fn load(&self, group_id: &str) -> Result<Option<GroupInfo>, StorageError> {
        let path = self.file_path(group_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub fn load_all(&self) -> Vec<GroupInfo> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut groups = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match std::fs::read(&path)
                .map_err(StorageError::from)
                .and_then(|b| serde_json::from_slice::<GroupInfo>(&b).map_err(StorageError::from))
            {
                Ok(group) => groups.push(group),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable group"),
            }
        }
        groups.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        groups
    }

    pub fn delete(&self, group_id: &str) -> Result<(), StorageError> {
        let path = self.file_path(group_id);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "groups_tests.rs"]
mod tests;
