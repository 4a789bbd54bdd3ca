// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance persistence: one JSON document keyed by instance id.
//!
//! `save` is a read-merge-write sequence. The merge recognizes three key
//! classes: identity/flag keys replaced wholesale, nested sections
//! deep-merged, and everything else — UUID-keyed model sections, trackers,
//! zones, tripwires, and other opaque blobs the control plane never
//! interprets — preserved untouched unless the new record mentions it.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::warn;

use ea_core::{looks_like_uuid, InstanceInfo};

use crate::atomic::write_atomic;
use crate::schema::{config_to_instance, instance_to_config, validate_config};
use crate::StorageError;

/// Top-level keys replaced wholesale on merge (identity, flags, runtime
/// stats).
const REPLACE_KEYS: &[&str] = &[
    "InstanceId",
    "DisplayName",
    "Solution",
    "SolutionName",
    "Group",
    "ReadOnly",
    "SystemInstance",
    "AutoStart",
    "AutoRestart",
    "loaded",
    "running",
    "fps",
    "version",
];

/// Nested sections deep-merged key by key.
const MERGE_KEYS: &[&str] = &[
    "Input",
    "SolutionManager",
    "Detector",
    "Movement",
    "OriginatorInfo",
    "AdditionalParams",
    "Output",
];

pub struct InstanceStorage {
    dir: PathBuf,
}

impl InstanceStorage {
    pub fn new(dir: &Path) -> Self {
        InstanceStorage { dir: dir.to_path_buf() }
    }

    fn file_path(&self) -> PathBuf {
        self.dir.join("instances.json")
    }

    fn load_document(&self) -> Map<String, Value> {
        let path = self.file_path();
        if !path.exists() {
            return Map::new();
        }
        match std::fs::read(&path).map_err(StorageError::from).and_then(|bytes| {
            serde_json::from_slice::<Value>(&bytes).map_err(StorageError::from)
        }) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(path = %path.display(), "unreadable instances document, starting empty");
                Map::new()
            }
        }
    }

    fn save_document(&self, document: &Map<String, Value>) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(&Value::Object(document.clone()))?;
        write_atomic(&self.file_path(), &bytes)?;
        Ok(())
    }

    /// Persist one instance, merging into an existing record per the key
    /// classes above.
    pub fn save(&self, instance_id: &str, info: &InstanceInfo) -> Result<(), StorageError> {
        if info.instance_id != instance_id {
            return Err(StorageError::InvalidRecord(format!(
                "InstanceId mismatch: expected {instance_id}, got {}",
                info.instance_id
            )));
        }
        let config = instance_to_config(info)?;
        self.save_raw(instance_id, &config)
    }

    /// Persist a raw config object for one instance (the direct-update
    /// path). The same merge rules apply.
    pub fn save_raw(&self, instance_id: &str, config: &Value) -> Result<(), StorageError> {
        validate_config(config)?;
        let new_config = config
            .as_object()
            .ok_or_else(|| StorageError::InvalidRecord("config must be a JSON object".into()))?;

        let mut document = self.load_document();
        match document.get_mut(instance_id).and_then(Value::as_object_mut) {
            Some(existing) => merge_configs(existing, new_config),
            None => {
                document.insert(instance_id.to_string(), config.clone());
            }
        }
        self.save_document(&document)
    }

    /// Load one instance, translated back to the semantic record.
    pub fn load(&self, instance_id: &str) -> Result<Option<InstanceInfo>, StorageError> {
        match self.load_document().get(instance_id) {
            Some(config) => Ok(Some(config_to_instance(config)?)),
            None => Ok(None),
        }
    }

    /// Load the raw persisted config for one instance.
    pub fn load_raw(&self, instance_id: &str) -> Option<Value> {
        self.load_document().get(instance_id).cloned()
    }

    /// All persisted instance ids. Keys that neither carry an `InstanceId`
    /// member nor look like a UUID are skipped (schema metadata, stray
    /// sections).
    pub fn load_all(&self) -> Vec<String> {
        self.load_document()
            .iter()
            .filter(|(key, value)| {
                value.get("InstanceId").is_some() || looks_like_uuid(key)
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Remove one instance. Deleting an absent id succeeds.
    pub fn delete(&self, instance_id: &str) -> Result<(), StorageError> {
        let mut document = self.load_document();
        if document.remove(instance_id).is_some() {
            self.save_document(&document)?;
        }
        Ok(())
    }

    pub fn exists(&self, instance_id: &str) -> bool {
        self.load_document().contains_key(instance_id)
    }
}

/// Merge a new record into an existing one.
///
/// Nested sections named in [`MERGE_KEYS`] deep-merge; every other key
/// present in the new record replaces the existing value ([`REPLACE_KEYS`]
/// and explicit opaque sections alike); keys only in the existing record —
/// including UUID-keyed model sections — are preserved byte for byte.
fn merge_configs(existing: &mut Map<String, Value>, new_config: &Map<String, Value>) {
    // Identity and flag fields: replaced wholesale.
    for key in REPLACE_KEYS {
        if let Some(value) = new_config.get(*key) {
            existing.insert((*key).to_string(), value.clone());
        }
    }

    // Nested sections: deep-merged field by field.
    for key in MERGE_KEYS {
        let Some(new_section) = new_config.get(*key).and_then(Value::as_object) else {
            continue;
        };
        let section = existing
            .entry((*key).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(section) = section {
            for (nested_key, nested_value) in new_section {
                section.insert(nested_key.clone(), nested_value.clone());
            }
        } else {
            *section = Value::Object(new_section.clone());
        }
    }

    // Any other key the new record mentions (opaque sections, UUID-keyed
    // model configs) replaces the old value; keys it does not mention stay
    // byte for byte.
    for (key, value) in new_config {
        if REPLACE_KEYS.contains(&key.as_str()) || MERGE_KEYS.contains(&key.as_str()) {
            continue;
        }
        existing.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
#[path = "instances_tests.rs"]
mod tests;
