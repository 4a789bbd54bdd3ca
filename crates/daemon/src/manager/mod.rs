// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The instance manager contract and its two backends.
//!
//! For a single instance id, mutations (`create`, `start`, `stop`,
//! `update`, `delete`) are serialized by a per-id async lock; reads are
//! consistent with the last completed mutation and never block on the
//! per-id lock. Batch operations fan out concurrently and join.

mod inprocess;
mod subprocess;

pub use inprocess::InProcessManager;
pub use subprocess::SubprocessManager;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use ea_core::env::ExecutionMode;
use ea_core::{
    CreateInstanceRequest, Error, InstanceInfo, InstanceStatistics, UpdateInstanceRequest,
};
use ea_solution::SolutionRegistry;
use ea_storage::InstanceStorage;

/// Pause between stop and start on a restart.
pub(crate) const RESTART_PAUSE: Duration = Duration::from_millis(500);

/// One entry of a batch result, in request order.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub instance_id: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Aggregate outcome of a batch operation. One failure never aborts the
/// batch.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub items: Vec<BatchItem>,
}

impl BatchResult {
    fn from_results(ids: &[String], results: Vec<Result<(), Error>>) -> Self {
        let items: Vec<BatchItem> = ids
            .iter()
            .zip(results)
            .map(|(id, result)| BatchItem {
                instance_id: id.clone(),
                success: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            })
            .collect();
        let success = items.iter().filter(|item| item.success).count();
        BatchResult { total: items.len(), success, failed: items.len() - success, items }
    }
}

/// The instance manager capability set. Two interchangeable backends
/// implement it: in-process and subprocess.
#[async_trait]
pub trait InstanceManager: Send + Sync {
    /// Create an instance from a request, returning the new id.
    async fn create(&self, req: CreateInstanceRequest) -> Result<String, Error>;

    /// Delete an instance: stop, tear down the backend, remove persisted
    /// state. Deleting an absent id succeeds.
    async fn delete(&self, instance_id: &str) -> Result<(), Error>;

    /// Start an instance. `skip_auto_stop` is set on the restart path.
    async fn start(&self, instance_id: &str, skip_auto_stop: bool) -> Result<(), Error>;

    /// Stop an instance. Stopping a non-running instance is a no-op.
    async fn stop(&self, instance_id: &str) -> Result<(), Error>;

    /// Structured update: validated, applied, persisted, forwarded.
    async fn update(&self, instance_id: &str, req: UpdateInstanceRequest) -> Result<(), Error>;

    /// Raw config update: merged through storage without semantic
    /// validation, forwarded verbatim.
    async fn update_from_config(&self, instance_id: &str, config: Value) -> Result<(), Error>;

    fn get_config(&self, instance_id: &str) -> Option<Value>;
    fn get_instance(&self, instance_id: &str) -> Option<InstanceInfo>;
    fn list_instances(&self) -> Vec<String>;
    fn get_all_instances(&self) -> Vec<InstanceInfo>;
    fn has_instance(&self, instance_id: &str) -> bool;
    fn instance_count(&self) -> usize;

    async fn get_statistics(&self, instance_id: &str) -> Result<InstanceStatistics, Error>;
    async fn get_last_frame(&self, instance_id: &str) -> Result<Value, Error>;

    /// Load every persisted instance at startup; returns how many loaded.
    async fn load_persistent_instances(&self) -> usize;

    /// Stop every instance past the retry limit; returns how many stopped.
    async fn check_and_handle_retry_limits(&self) -> usize;

    /// Orderly shutdown of the backend.
    async fn shutdown(&self);

    /// Restart: stop, pause, start with `skip_auto_stop`.
    async fn restart(&self, instance_id: &str) -> Result<(), Error> {
        self.stop(instance_id).await?;
        tokio::time::sleep(RESTART_PAUSE).await;
        self.start(instance_id, true).await
    }

    async fn start_batch(&self, ids: &[String]) -> BatchResult {
        let results =
            futures_util::future::join_all(ids.iter().map(|id| self.start(id, false))).await;
        BatchResult::from_results(ids, results)
    }

    async fn stop_batch(&self, ids: &[String]) -> BatchResult {
        let results = futures_util::future::join_all(ids.iter().map(|id| self.stop(id))).await;
        BatchResult::from_results(ids, results)
    }

    async fn restart_batch(&self, ids: &[String]) -> BatchResult {
        let results = futures_util::future::join_all(ids.iter().map(|id| self.restart(id))).await;
        BatchResult::from_results(ids, results)
    }
}

/// Per-id async mutation locks. Locks are created on demand and dropped
/// with the instance.
pub(crate) struct MutationLocks {
    locks: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl MutationLocks {
    pub fn new() -> Self {
        MutationLocks { locks: parking_lot::Mutex::new(HashMap::new()) }
    }

    pub async fn acquire(&self, instance_id: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(instance_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    pub fn forget(&self, instance_id: &str) {
        self.locks.lock().remove(instance_id);
    }
}

/// Build the backend selected by `EDGE_AI_EXECUTION_MODE`.
pub fn create_manager(
    registry: Arc<SolutionRegistry>,
    storage: Arc<InstanceStorage>,
    worker_executable: &str,
) -> Arc<dyn InstanceManager> {
    match ea_core::env::execution_mode() {
        ExecutionMode::Subprocess => {
            tracing::info!(worker = worker_executable, "instance manager: subprocess backend");
            let manager: Arc<dyn InstanceManager> =
                SubprocessManager::new(registry, storage, worker_executable);
            manager
        }
        ExecutionMode::InProcess => {
            tracing::info!("instance manager: in-process backend");
            let manager: Arc<dyn InstanceManager> = InProcessManager::new(registry, storage);
            manager
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
