// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Group registry: named instance collections with persistence.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::info;

use ea_core::{
    validate_group_id, validate_group_name, Error, GroupInfo, InstanceInfo, DEFAULT_GROUP_ID,
};
use ea_storage::GroupStorage;

pub struct GroupRegistry {
    groups: RwLock<HashMap<String, GroupInfo>>,
    storage: GroupStorage,
}

impl GroupRegistry {
    /// Load persisted groups and ensure the built-in default group exists.
    pub fn new(storage: GroupStorage) -> Self {
        let mut groups = HashMap::new();
        for group in storage.load_all() {
            groups.insert(group.group_id.clone(), group);
        }
        let registry = GroupRegistry { groups: RwLock::new(groups), storage };
        registry.ensure_default();
        registry
    }

    fn ensure_default(&self) {
        let mut groups = self.groups.write();
        if groups.contains_key(DEFAULT_GROUP_ID) {
            return;
        }
        let default = GroupInfo {
            group_id: DEFAULT_GROUP_ID.to_string(),
            display_name: "Default".to_string(),
            description: "Default group".to_string(),
            is_default: true,
            read_only: false,
            instance_count: 0,
        };
        let _ = self.storage.save(&default);
        groups.insert(default.group_id.clone(), default);
        info!("default group created");
    }

    pub fn create(&self, group: GroupInfo) -> Result<(), Error> {
        validate_group_id(&group.group_id)?;
        validate_group_name(&group.display_name)?;
        let mut groups = self.groups.write();
        if groups.contains_key(&group.group_id) {
            return Err(Error::AlreadyExists(format!("group already exists: {}", group.group_id)));
        }
        let mut group = group;
        group.is_default = false;
        self.storage.save(&group).map_err(Error::from)?;
        groups.insert(group.group_id.clone(), group);
        Ok(())
    }

    pub fn get(&self, group_id: &str) -> Option<GroupInfo> {
        self.groups.read().get(group_id).cloned()
    }

    pub fn list(&self) -> Vec<GroupInfo> {
        let mut groups: Vec<GroupInfo> = self.groups.read().values().cloned().collect();
        groups.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        groups
    }

    /// List with the derived per-group instance count filled in.
    pub fn list_with_counts(&self, instances: &[InstanceInfo]) -> Vec<GroupInfo> {
        let mut groups = self.list();
        for group in &mut groups {
            group.instance_count = instances
                .iter()
                .filter(|info| {
                    info.group == group.group_id
                        || (info.group.is_empty() && group.group_id == DEFAULT_GROUP_ID)
                })
                .count();
        }
        groups
    }

    /// Update a group. Read-only groups cannot be modified.
    pub fn update(&self, group: GroupInfo) -> Result<(), Error> {
        validate_group_name(&group.display_name)?;
        let mut groups = self.groups.write();
        let existing = groups
            .get(&group.group_id)
            .ok_or_else(|| Error::not_found(format!("group not found: {}", group.group_id)))?;
        if existing.read_only {
            return Err(Error::conflict(format!("group is read-only: {}", group.group_id)));
        }
        // The default flag is not writable through updates.
        let mut group = group;
        group.is_default = existing.is_default;
        self.storage.save(&group).map_err(Error::from)?;
        groups.insert(group.group_id.clone(), group);
        Ok(())
    }

    /// Delete a group. Default groups and non-empty groups cannot be
    /// deleted.
    pub fn delete(&self, group_id: &str, instance_count: usize) -> Result<(), Error> {
        let mut groups = self.groups.write();
        let existing = groups
            .get(group_id)
            .ok_or_else(|| Error::not_found(format!("group not found: {group_id}")))?;
        if existing.is_default {
            return Err(Error::conflict(format!("cannot delete default group: {group_id}")));
        }
        if instance_count > 0 {
            return Err(Error::conflict(format!(
                "cannot delete non-empty group {group_id} ({instance_count} instances)"
            )));
        }
        self.storage.delete(group_id).map_err(Error::from)?;
        groups.remove(group_id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "groups_tests.rs"]
mod tests;
