// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory solution catalog.
//!
//! Read-mostly and concurrent: lookups take a shared lock, mutations an
//! exclusive one. Custom solutions persist through [`SolutionStorage`];
//! defaults never touch disk.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::info;

use ea_core::{Error, SolutionConfig};
use ea_storage::SolutionStorage;

pub struct SolutionRegistry {
    solutions: RwLock<HashMap<String, SolutionConfig>>,
    storage: Option<SolutionStorage>,
}

impl SolutionRegistry {
    /// Registry without persistence (workers, tests).
    pub fn new() -> Self {
        SolutionRegistry { solutions: RwLock::new(HashMap::new()), storage: None }
    }

    /// Registry backed by `solutions.json` for custom solutions.
    pub fn with_storage(storage: SolutionStorage) -> Self {
        SolutionRegistry { solutions: RwLock::new(HashMap::new()), storage: Some(storage) }
    }

    /// Seed the fixed set of built-in solutions.
    pub fn initialize_defaults(&self) {
        let mut solutions = self.solutions.write();
        for solution in crate::built_in_solutions() {
            solutions.insert(solution.solution_id.clone(), solution);
        }
        info!(count = solutions.len(), "default solutions registered");
    }

    /// Load persisted custom solutions. Called after
    /// [`initialize_defaults`]; records flagged default on disk are skipped
    /// by the storage layer.
    pub fn load_persisted(&self) {
        let Some(storage) = &self.storage else { return };
        let persisted = storage.load_all();
        let mut solutions = self.solutions.write();
        for solution in persisted {
            // A stored custom may not shadow a built-in.
            if solutions.get(&solution.solution_id).is_some_and(|s| s.is_default) {
                continue;
            }
            solutions.insert(solution.solution_id.clone(), solution);
        }
    }

    /// Register a custom solution and persist it.
    pub fn register(&self, solution: SolutionConfig) -> Result<(), Error> {
        if solution.solution_id.is_empty() {
            return Err(Error::validation("solutionId is required"));
        }
        if solution.pipeline.is_empty() {
            return Err(Error::validation("solution pipeline cannot be empty"));
        }
        {
            let solutions = self.solutions.read();
            if solutions.get(&solution.solution_id).is_some_and(|s| s.is_default) {
                return Err(Error::conflict(format!(
                    "cannot replace default solution: {}",
                    solution.solution_id
                )));
            }
        }
        let mut solution = solution;
        solution.is_default = false;
        if let Some(storage) = &self.storage {
            storage.save(&solution).map_err(Error::from)?;
        }
        self.solutions.write().insert(solution.solution_id.clone(), solution);
        Ok(())
    }

    pub fn get(&self, solution_id: &str) -> Option<SolutionConfig> {
        self.solutions.read().get(solution_id).cloned()
    }

    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.solutions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn has(&self, solution_id: &str) -> bool {
        self.solutions.read().contains_key(solution_id)
    }

    pub fn get_all(&self) -> HashMap<String, SolutionConfig> {
        self.solutions.read().clone()
    }

    /// Update an existing non-default solution.
    pub fn update(&self, solution: SolutionConfig) -> Result<(), Error> {
        let mut solutions = self.solutions.write();
        match solutions.get(&solution.solution_id) {
            None => {
                return Err(Error::not_found(format!(
                    "solution not found: {}",
                    solution.solution_id
                )))
            }
            Some(existing) if existing.is_default => {
                return Err(Error::conflict(format!(
                    "cannot modify default solution: {}",
                    solution.solution_id
                )))
            }
            Some(_) => {}
        }
        let mut solution = solution;
        solution.is_default = false;
        if let Some(storage) = &self.storage {
            storage.save(&solution).map_err(Error::from)?;
        }
        solutions.insert(solution.solution_id.clone(), solution);
        Ok(())
    }

    /// Delete a non-default solution. Deleting a default fails.
    pub fn delete(&self, solution_id: &str) -> Result<(), Error> {
        let mut solutions = self.solutions.write();
        match solutions.get(solution_id) {
            None => return Err(Error::not_found(format!("solution not found: {solution_id}"))),
            Some(existing) if existing.is_default => {
                return Err(Error::conflict(format!(
                    "cannot delete default solution: {solution_id}"
                )))
            }
            Some(_) => {}
        }
        if let Some(storage) = &self.storage {
            storage.delete(solution_id).map_err(Error::from)?;
        }
        solutions.remove(solution_id);
        Ok(())
    }

    pub fn is_default(&self, solution_id: &str) -> bool {
        self.solutions.read().get(solution_id).is_some_and(|s| s.is_default)
    }
}

impl Default for SolutionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
