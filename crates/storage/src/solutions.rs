// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Custom solution persistence: `solutions.json`, one record per solution.
//!
//! Default solutions exist only in code. Saving one is a no-op on disk, and
//! any stored record flagged default is ignored on load.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::warn;

use ea_core::SolutionConfig;

use crate::atomic::write_atomic;
use crate::StorageError;

pub struct SolutionStorage {
    dir: PathBuf,
}

impl SolutionStorage {
    pub fn new(dir: &Path) -> Self {
        SolutionStorage { dir: dir.to_path_buf() }
    }

    fn file_path(&self) -> PathBuf {
        self.dir.join("solutions.json")
    }

    fn load_document(&self) -> Map<String, Value> {
        let path = self.file_path();
        if !path.exists() {
            return Map::new();
        }
        match std::fs::read(&path)
            .map_err(StorageError::from)
            .and_then(|b| serde_json::from_slice::<Value>(&b).map_err(StorageError::from))
        {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(path = %path.display(), "unreadable solutions document, starting empty");
                Map::new()
            }
        }
    }

    fn save_document(&self, document: &Map<String, Value>) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(&Value::Object(document.clone()))?;
        write_atomic(&self.file_path(), &bytes)?;
        Ok(())
    }

    /// Persist a custom solution. Defaults are never written.
    pub fn save(&self, solution: &SolutionConfig) -> Result<(), StorageError> {
        if solution.is_default {
            return Ok(());
        }
        if solution.solution_id.is_empty() {
            return Err(StorageError::InvalidRecord("solutionId cannot be empty".into()));
        }
        let mut document = self.load_document();
        document.insert(solution.solution_id.clone(), serde_json::to_value(solution)?);
        self.save_document(&document)
    }

    /// Load every persisted custom solution, skipping records flagged
    /// default.
    pub fn load_all(&self) -> Vec<SolutionConfig> {
        self.load_document()
            .into_iter()
            .filter_map(|(id, value)| {
                if value.get("isDefault").and_then(Value::as_bool).unwrap_or(false) {
                    warn!(solution = %id, "skipping stored solution flagged default");
                    return None;
                }
                match serde_json::from_value::<SolutionConfig>(value) {
                    Ok(mut solution) => {
                        solution.is_default = false;
                        Some(solution)
                    }
                    Err(e) => {
                        warn!(solution = %id, error = %e, "skipping unreadable solution record");
                        None
                    }
                }
            })
            .collect()
    }

    pub fn delete(&self, solution_id: &str) -> Result<(), StorageError> {
        let mut document = self.load_document();
        if document.remove(solution_id).is_some() {
            self.save_document(&document)?;
        }
        Ok(())
    }

    pub fn exists(&self, solution_id: &str) -> bool {
        self.load_document().contains_key(solution_id)
    }
}

#[cfg(test)]
#[path = "solutions_tests.rs"]
mod tests;
