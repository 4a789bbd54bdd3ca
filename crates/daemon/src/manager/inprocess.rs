// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process backend: pipelines live in this address space.
//!
//! The registry map is a shared-read/exclusive-write lock: list and get
//! take the shared side, lifecycle mutations the exclusive side. A monitor
//! task folds source-node failure reports into the per-instance retry
//! counter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ea_core::{
    new_instance_id, CreateInstanceRequest, Error, InstanceInfo, InstanceStatistics,
    UpdateInstanceRequest,
};
use ea_pipeline::{build_pipeline, Pipeline};
use ea_solution::SolutionRegistry;
use ea_storage::InstanceStorage;

use crate::manager::{InstanceManager, MutationLocks};

/// Source-failure sweep cadence.
const MONITOR_INTERVAL: Duration = Duration::from_secs(1);

struct Entry {
    info: InstanceInfo,
    pipeline: Option<Pipeline>,
    /// Source failures already folded into the retry counter.
    failures_seen: u32,
}

pub struct InProcessManager {
    registry: Arc<SolutionRegistry>,
    storage: Arc<InstanceStorage>,
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    locks: MutationLocks,
    max_retries: u32,
    monitor_cancel: CancellationToken,
}

impl InProcessManager {
    pub fn new(registry: Arc<SolutionRegistry>, storage: Arc<InstanceStorage>) -> Arc<Self> {
        let manager = Arc::new(InProcessManager {
            registry,
            storage,
            entries: Arc::new(RwLock::new(HashMap::new())),
            locks: MutationLocks::new(),
            max_retries: ea_core::env::max_restarts(),
            monitor_cancel: CancellationToken::new(),
        });

        // Source monitor: watches source nodes for repeated failures and
        // bumps retry counters. Nodes report failures via
        // `report_source_failure`; this task folds them in.
        let entries = Arc::clone(&manager.entries);
        let cancel = manager.monitor_cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(MONITOR_INTERVAL) => {}
                }
                let mut entries = entries.write();
                for entry in entries.values_mut() {
                    let failures = entry.pipeline.as_ref().map_or(0, Pipeline::source_failures);
                    if failures > entry.failures_seen {
                        entry.info.retry_count += failures - entry.failures_seen;
                        entry.failures_seen = failures;
                    }
                }
            }
        });

        manager
    }

    /// Callback surface for source nodes: record one failure against an
    /// instance's source. The monitor sweep converts these into retries.
    pub fn report_source_failure(&self, instance_id: &str) -> bool {
        let mut entries = self.entries.write();
        match entries.get_mut(instance_id).and_then(|e| e.pipeline.as_mut()) {
            Some(pipeline) => {
                pipeline.record_source_failure();
                true
            }
            None => false,
        }
    }

    fn persist(&self, info: &InstanceInfo) {
        if !info.persistent {
            return;
        }
        if let Err(e) = self.storage.save(&info.instance_id, info) {
            warn!(instance = %info.instance_id, error = %e, "persist failed");
        }
    }

    fn build_for(&self, info: &InstanceInfo) -> Result<Pipeline, Error> {
        let solution = self
            .registry
            .get(&info.solution_id)
            .ok_or_else(|| Error::not_found(format!("solution not found: {}", info.solution_id)))?;
        build_pipeline(&solution, &info.to_request(), &info.instance_id).map_err(Error::from)
    }

    async fn start_inner(&self, instance_id: &str, _skip_auto_stop: bool) -> Result<(), Error> {
        // Build outside the map lock; the per-id mutation lock already
        // serializes lifecycle changes for this instance.
        let info = {
            let entries = self.entries.read();
            let entry = entries
                .get(instance_id)
                .ok_or_else(|| Error::not_found(format!("instance not found: {instance_id}")))?;
            if entry.info.running {
                return Ok(());
            }
            entry.info.clone()
        };
        if info.solution_id.is_empty() {
            return Err(Error::validation("instance has no solution"));
        }

        let needs_build = {
            let entries = self.entries.read();
            entries.get(instance_id).is_some_and(|e| e.pipeline.is_none())
        };
        let built = if needs_build { Some(self.build_for(&info)?) } else { None };

        let updated = {
            let mut entries = self.entries.write();
            let entry = entries
                .get_mut(instance_id)
                .ok_or_else(|| Error::not_found(format!("instance not found: {instance_id}")))?;
            if let Some(pipeline) = built {
                entry.pipeline = Some(pipeline);
            }
            match entry.pipeline.as_mut() {
                Some(pipeline) => pipeline.start()?,
                None => return Err(Error::internal("pipeline missing after build")),
            }
            entry.info.running = true;
            entry.info.clone()
        };
        self.persist(&updated);
        info!(instance = instance_id, "instance started");
        Ok(())
    }

    async fn stop_inner(&self, instance_id: &str) -> Result<(), Error> {
        let updated = {
            let mut entries = self.entries.write();
            let entry = entries
                .get_mut(instance_id)
                .ok_or_else(|| Error::not_found(format!("instance not found: {instance_id}")))?;
            if !entry.info.running {
                return Ok(());
            }
            if let Some(pipeline) = entry.pipeline.as_mut() {
                pipeline.stop();
            }
            entry.info.running = false;
            entry.info.clone()
        };
        self.persist(&updated);
        info!(instance = instance_id, "instance stopped");
        Ok(())
    }
}

#[async_trait]
impl InstanceManager for InProcessManager {
    async fn create(&self, req: CreateInstanceRequest) -> Result<String, Error> {
        req.validate()?;
        if !req.solution.is_empty() && !self.registry.has(&req.solution) {
            return Err(Error::not_found(format!("solution not found: {}", req.solution)));
        }

        let instance_id = new_instance_id();
        let _guard = self.locks.acquire(&instance_id).await;

        let mut info = InstanceInfo::from_request(&instance_id, &req);
        if let Some(solution) = self.registry.get(&req.solution) {
            info.solution_name = solution.solution_name;
        }

        self.entries.write().insert(
            instance_id.clone(),
            Entry { info: info.clone(), pipeline: None, failures_seen: 0 },
        );
        self.persist(&info);

        if req.auto_start {
            self.start_inner(&instance_id, false).await?;
        }

        info!(instance = %instance_id, solution = %req.solution, "instance created");
        Ok(instance_id)
    }

    async fn delete(&self, instance_id: &str) -> Result<(), Error> {
        let guard = self.locks.acquire(instance_id).await;

        {
            let mut entries = self.entries.write();
            if let Some(mut entry) = entries.remove(instance_id) {
                if let Some(pipeline) = entry.pipeline.as_mut() {
                    pipeline.stop();
                }
            }
        }
        if let Err(e) = self.storage.delete(instance_id) {
            warn!(instance = instance_id, error = %e, "storage delete failed");
        }
        drop(guard);
        self.locks.forget(instance_id);
        info!(instance = instance_id, "instance deleted");
        Ok(())
    }

    async fn start(&self, instance_id: &str, skip_auto_stop: bool) -> Result<(), Error> {
        let _guard = self.locks.acquire(instance_id).await;
        self.start_inner(instance_id, skip_auto_stop).await
    }

    async fn stop(&self, instance_id: &str) -> Result<(), Error> {
        let _guard = self.locks.acquire(instance_id).await;
        self.stop_inner(instance_id).await
    }

    async fn update(&self, instance_id: &str, req: UpdateInstanceRequest) -> Result<(), Error> {
        req.validate()?;
        let _guard = self.locks.acquire(instance_id).await;

        let (info, deltas) = {
            let mut entries = self.entries.write();
            let entry = entries
                .get_mut(instance_id)
                .ok_or_else(|| Error::not_found(format!("instance not found: {instance_id}")))?;
            req.apply_to(&mut entry.info);

            // Hot-apply the node-level knobs this backend can change in
            // place.
            let mut deltas = Vec::new();
            if let Some(sensitivity) = &req.detection_sensitivity {
                let threshold =
                    ea_core::DetectionSensitivity::parse(sensitivity).threshold();
                deltas.push(("score_threshold".to_string(), threshold.to_string()));
            }
            if let Some(rate) = req.frame_rate_limit {
                deltas.push(("frame_rate_limit".to_string(), rate.to_string()));
            }
            if let Some(pipeline) = entry.pipeline.as_mut() {
                for (key, value) in &deltas {
                    pipeline.set_param(key, value);
                }
            }
            (entry.info.clone(), deltas)
        };
        self.persist(&info);
        info!(instance = instance_id, applied = deltas.len(), "instance updated");
        Ok(())
    }

    async fn update_from_config(&self, instance_id: &str, config: Value) -> Result<(), Error> {
        let _guard = self.locks.acquire(instance_id).await;
        if !self.entries.read().contains_key(instance_id) {
            return Err(Error::not_found(format!("instance not found: {instance_id}")));
        }

        let mut config = config;
        if config.get("InstanceId").is_none() {
            config["InstanceId"] = json!(instance_id);
        }
        self.storage.save_raw(instance_id, &config).map_err(Error::from)?;

        if let Ok(Some(mut loaded)) = self.storage.load(instance_id) {
            let mut entries = self.entries.write();
            if let Some(entry) = entries.get_mut(instance_id) {
                loaded.running = entry.info.running;
                loaded.retry_count = entry.info.retry_count;
                loaded.retry_limit_reached = entry.info.retry_limit_reached;
                entry.info = loaded;
            }
        }
        Ok(())
    }

    fn get_config(&self, instance_id: &str) -> Option<Value> {
        self.storage.load_raw(instance_id)
    }

    fn get_instance(&self, instance_id: &str) -> Option<InstanceInfo> {
        self.entries.read().get(instance_id).map(|e| e.info.clone())
    }

    fn list_instances(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn get_all_instances(&self) -> Vec<InstanceInfo> {
        self.entries.read().values().map(|e| e.info.clone()).collect()
    }

    fn has_instance(&self, instance_id: &str) -> bool {
        self.entries.read().contains_key(instance_id)
    }

    fn instance_count(&self) -> usize {
        self.entries.read().len()
    }

    async fn get_statistics(&self, instance_id: &str) -> Result<InstanceStatistics, Error> {
        let entries = self.entries.read();
        let entry = entries
            .get(instance_id)
            .ok_or_else(|| Error::not_found(format!("instance not found: {instance_id}")))?;
        Ok(InstanceStatistics {
            state: if entry.info.running { "running".into() } else { "stopped".into() },
            current_fps: entry.info.fps,
            ..Default::default()
        })
    }

    async fn get_last_frame(&self, instance_id: &str) -> Result<Value, Error> {
        if !self.entries.read().contains_key(instance_id) {
            return Err(Error::not_found(format!("instance not found: {instance_id}")));
        }
        // Frame capture runs inside the worker in subprocess mode; this
        // backend has no capture hook wired into the stub nodes.
        Err(Error::not_found(format!("no frame captured for {instance_id}")))
    }

    async fn load_persistent_instances(&self) -> usize {
        let mut loaded = 0;
        for instance_id in self.storage.load_all() {
            let _guard = self.locks.acquire(&instance_id).await;
            let info = match self.storage.load(&instance_id) {
                Ok(Some(info)) => info,
                Ok(None) => continue,
                Err(e) => {
                    warn!(instance = %instance_id, error = %e, "skipping unreadable instance");
                    continue;
                }
            };
            let was_running = self
                .storage
                .load_raw(&instance_id)
                .and_then(|raw| raw.get("running").and_then(Value::as_bool))
                .unwrap_or(false);
            let auto_start = info.auto_start;

            self.entries.write().insert(
                instance_id.clone(),
                Entry { info, pipeline: None, failures_seen: 0 },
            );
            loaded += 1;

            if auto_start || was_running {
                if let Err(e) = self.start_inner(&instance_id, false).await {
                    warn!(instance = %instance_id, error = %e, "auto-start failed at load");
                }
            }
        }
        info!(loaded, "persistent instances loaded");
        loaded
    }

    async fn check_and_handle_retry_limits(&self) -> usize {
        let over_limit: Vec<String> = {
            let entries = self.entries.read();
            entries
                .iter()
                .filter(|(_, entry)| {
                    entry.info.retry_count > self.max_retries && entry.info.running
                })
                .map(|(id, _)| id.clone())
                .collect()
        };

        let mut stopped = 0;
        for instance_id in over_limit {
            let _guard = self.locks.acquire(&instance_id).await;
            let _ = self.stop_inner(&instance_id).await;
            if let Some(entry) = self.entries.write().get_mut(&instance_id) {
                entry.info.retry_limit_reached = true;
            }
            warn!(instance = %instance_id, "stopped: retry limit exceeded");
            stopped += 1;
        }
        stopped
    }

    async fn shutdown(&self) {
        self.monitor_cancel.cancel();
        let mut entries = self.entries.write();
        for entry in entries.values_mut() {
            if let Some(pipeline) = entry.pipeline.as_mut() {
                pipeline.stop();
            }
            entry.info.running = false;
        }
    }
}

#[cfg(test)]
#[path = "inprocess_tests.rs"]
mod tests;
