// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess backend: one isolated worker process per instance, driven
//! through the supervisor.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use ea_core::{
    new_instance_id, CreateInstanceRequest, Error, InstanceInfo, InstanceStatistics,
    UpdateInstanceRequest,
};
use ea_solution::SolutionRegistry;
use ea_storage::InstanceStorage;
use ea_wire::{IpcMessage, MessageType, ResponseStatus};

use crate::manager::{InstanceManager, MutationLocks};
use crate::supervisor::{SupervisorConfig, WorkerState, WorkerSupervisor};

pub struct SubprocessManager {
    supervisor: Arc<WorkerSupervisor>,
    registry: Arc<SolutionRegistry>,
    storage: Arc<InstanceStorage>,
    instances: Arc<Mutex<HashMap<String, InstanceInfo>>>,
    locks: MutationLocks,
    max_retries: u32,
}

impl SubprocessManager {
    pub fn new(
        registry: Arc<SolutionRegistry>,
        storage: Arc<InstanceStorage>,
        worker_executable: &str,
    ) -> Arc<Self> {
        Self::with_supervisor_config(registry, storage, worker_executable, SupervisorConfig::default())
    }

    pub fn with_supervisor_config(
        registry: Arc<SolutionRegistry>,
        storage: Arc<InstanceStorage>,
        worker_executable: &str,
        config: SupervisorConfig,
    ) -> Arc<Self> {
        let max_retries = config.max_restarts;
        let supervisor = Arc::new(WorkerSupervisor::with_config(worker_executable, config));
        let manager = Arc::new(SubprocessManager {
            supervisor: Arc::clone(&supervisor),
            registry,
            storage,
            instances: Arc::new(Mutex::new(HashMap::new())),
            locks: MutationLocks::new(),
            max_retries,
        });

        let weak: Weak<SubprocessManager> = Arc::downgrade(&manager);
        supervisor.set_error_callback(move |instance_id, message| {
            if let Some(manager) = weak.upgrade() {
                manager.on_worker_error(instance_id, message);
            }
        });
        supervisor.start();
        manager
    }

    /// The supervisor behind this manager (tests, status surfaces).
    pub fn supervisor(&self) -> &Arc<WorkerSupervisor> {
        &self.supervisor
    }

    /// Crash bookkeeping: bump the retry counter, drop the running flag,
    /// and schedule an auto-restart respawn when the instance wants one.
    fn on_worker_error(self: Arc<Self>, instance_id: &str, message: &str) {
        warn!(instance = instance_id, message, "worker error reported");
        let terminal = message.contains("exceeded max restarts");

        let respawn = {
            let mut instances = self.instances.lock();
            match instances.get_mut(instance_id) {
                Some(info) => {
                    let was_running = info.running;
                    info.retry_count += 1;
                    info.running = false;
                    if info.retry_count > self.max_retries {
                        info.retry_limit_reached = true;
                    }
                    !terminal && info.auto_restart && was_running && !info.retry_limit_reached
                }
                None => false,
            }
        };

        if respawn {
            let manager = Arc::clone(&self);
            let instance_id = instance_id.to_string();
            tokio::spawn(async move {
                manager.respawn_after_crash(&instance_id).await;
            });
        }
    }

    /// Wait until the supervisor parks the crashed record in Stopped, then
    /// respawn from the instance's config and start it again.
    async fn respawn_after_crash(&self, instance_id: &str) {
        for _ in 0..100 {
            match self.supervisor.worker_state(instance_id) {
                WorkerState::Stopped => break,
                WorkerState::Crashed | WorkerState::Starting | WorkerState::Ready
                | WorkerState::Busy | WorkerState::Stopping => {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }

        let _guard = self.locks.acquire(instance_id).await;
        let Some(config) = self.worker_config(instance_id) else { return };
        info!(instance = instance_id, "auto-restart: respawning worker");
        if let Err(e) = self.supervisor.spawn_worker(instance_id, &config).await {
            error!(instance = instance_id, error = %e, "auto-restart spawn failed");
            return;
        }
        if let Err(e) = self.start_inner(instance_id, true).await {
            error!(instance = instance_id, error = %e, "auto-restart start failed");
        }
    }

    fn worker_config(&self, instance_id: &str) -> Option<Value> {
        let instances = self.instances.lock();
        let info = instances.get(instance_id)?;
        serde_json::to_value(info.to_request()).ok()
    }

    fn require_instance(&self, instance_id: &str) -> Result<InstanceInfo, Error> {
        self.instances
            .lock()
            .get(instance_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("instance not found: {instance_id}")))
    }

    fn persist(&self, info: &InstanceInfo) {
        if !info.persistent {
            return;
        }
        if let Err(e) = self.storage.save(&info.instance_id, info) {
            warn!(instance = %info.instance_id, error = %e, "persist failed");
        }
    }

    fn response_error(resp: &IpcMessage) -> Error {
        let message = resp.error().unwrap_or("worker request failed").to_string();
        match resp.status() {
            s if s == ResponseStatus::NotFound.as_i64() => Error::NotFound(message),
            s if s == ResponseStatus::InvalidRequest.as_i64() => Error::Validation(message),
            s if s == ResponseStatus::AlreadyExists.as_i64() => Error::AlreadyExists(message),
            s if s == ResponseStatus::Timeout.as_i64() => Error::Transport(message),
            s if s == ResponseStatus::InternalError.as_i64() => Error::Internal(message),
            _ => Error::Subprocess(message),
        }
    }

    async fn command(
        &self,
        instance_id: &str,
        msg_type: MessageType,
        payload: Value,
    ) -> Result<IpcMessage, Error> {
        let msg = IpcMessage::with_payload(msg_type, payload);
        let resp =
            self.supervisor.send_to_worker(instance_id, &msg, ea_core::env::ipc_timeout()).await?;
        if resp.msg_type == MessageType::ErrorResponse || !resp.success() {
            return Err(Self::response_error(&resp));
        }
        Ok(resp)
    }

    async fn start_inner(&self, instance_id: &str, _skip_auto_stop: bool) -> Result<(), Error> {
        let info = self.require_instance(instance_id)?;
        if info.running {
            return Ok(());
        }
        if !self.supervisor.is_worker_ready(instance_id) {
            return Err(Error::Subprocess(format!(
                "worker not ready for {instance_id} (state {:?})",
                self.supervisor.worker_state(instance_id)
            )));
        }
        self.command(instance_id, MessageType::StartInstance, json!({"instance_id": instance_id}))
            .await?;

        let updated = {
            let mut instances = self.instances.lock();
            instances.get_mut(instance_id).map(|info| {
                info.running = true;
                info.clone()
            })
        };
        if let Some(info) = updated {
            self.persist(&info);
        }
        info!(instance = instance_id, "instance started");
        Ok(())
    }

    async fn stop_inner(&self, instance_id: &str) -> Result<(), Error> {
        let info = self.require_instance(instance_id)?;
        if !info.running {
            return Ok(());
        }
        if self.supervisor.is_worker_ready(instance_id) {
            self.command(instance_id, MessageType::StopInstance, json!({"instance_id": instance_id}))
                .await?;
        }
        let updated = {
            let mut instances = self.instances.lock();
            instances.get_mut(instance_id).map(|info| {
                info.running = false;
                info.clone()
            })
        };
        if let Some(info) = updated {
            self.persist(&info);
        }
        info!(instance = instance_id, "instance stopped");
        Ok(())
    }
}

#[async_trait]
impl InstanceManager for SubprocessManager {
    async fn create(&self, req: CreateInstanceRequest) -> Result<String, Error> {
        req.validate()?;
        if !req.solution.is_empty() && !self.registry.has(&req.solution) {
            return Err(Error::not_found(format!("solution not found: {}", req.solution)));
        }

        let instance_id = new_instance_id();
        let _guard = self.locks.acquire(&instance_id).await;

        let config = serde_json::to_value(&req)
            .map_err(|e| Error::internal(format!("request serialization failed: {e}")))?;
        self.supervisor.spawn_worker(&instance_id, &config).await?;

        let info = InstanceInfo::from_request(&instance_id, &req);
        self.instances.lock().insert(instance_id.clone(), info.clone());
        self.persist(&info);

        if req.auto_start {
            self.start_inner(&instance_id, false).await?;
        }

        info!(instance = %instance_id, solution = %req.solution, "instance created");
        Ok(instance_id)
    }

    async fn delete(&self, instance_id: &str) -> Result<(), Error> {
        let guard = self.locks.acquire(instance_id).await;

        // Stop first so the worker winds down its pipeline; tolerate every
        // failure on this path, delete must win.
        if self.instances.lock().get(instance_id).is_some_and(|i| i.running) {
            let _ = self.stop_inner(instance_id).await;
        }
        if !self.supervisor.terminate_worker(instance_id, false).await {
            self.supervisor.terminate_worker(instance_id, true).await;
        }

        self.instances.lock().remove(instance_id);
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

        let info = {
            let mut instances = self.instances.lock();
            let info = instances
                .get_mut(instance_id)
                .ok_or_else(|| Error::not_found(format!("instance not found: {instance_id}")))?;
            req.apply_to(info);
            info.clone()
        };
        self.persist(&info);

        // Forward for hot application; a worker that is not ready picks the
        // change up from persisted config on its next spawn.
        if self.supervisor.is_worker_ready(instance_id) {
            let config = serde_json::to_value(info.to_request())
                .map_err(|e| Error::internal(format!("config serialization failed: {e}")))?;
            self.command(
                instance_id,
                MessageType::UpdateInstance,
                json!({"instance_id": instance_id, "config": config}),
            )
            .await?;
        }
        Ok(())
    }

    async fn update_from_config(&self, instance_id: &str, config: Value) -> Result<(), Error> {
        let _guard = self.locks.acquire(instance_id).await;
        self.require_instance(instance_id)?;

        let mut config = config;
        if config.get("InstanceId").is_none() {
            config["InstanceId"] = json!(instance_id);
        }
        self.storage.save_raw(instance_id, &config).map_err(Error::from)?;

        // Refresh the semantic record from the merged document, keeping the
        // runtime-only fields.
        if let Ok(Some(mut loaded)) = self.storage.load(instance_id) {
            let mut instances = self.instances.lock();
            if let Some(info) = instances.get_mut(instance_id) {
                loaded.running = info.running;
                loaded.retry_count = info.retry_count;
                loaded.retry_limit_reached = info.retry_limit_reached;
                *info = loaded;
            }
        }

        if self.supervisor.is_worker_ready(instance_id) {
            self.command(
                instance_id,
                MessageType::UpdateInstance,
                json!({"instance_id": instance_id, "config": config}),
            )
            .await?;
        }
        Ok(())
    }

    fn get_config(&self, instance_id: &str) -> Option<Value> {
        self.storage.load_raw(instance_id)
    }

    fn get_instance(&self, instance_id: &str) -> Option<InstanceInfo> {
        self.instances.lock().get(instance_id).cloned()
    }

    fn list_instances(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.instances.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn get_all_instances(&self) -> Vec<InstanceInfo> {
        self.instances.lock().values().cloned().collect()
    }

    fn has_instance(&self, instance_id: &str) -> bool {
        self.instances.lock().contains_key(instance_id)
    }

    fn instance_count(&self) -> usize {
        self.instances.lock().len()
    }

    async fn get_statistics(&self, instance_id: &str) -> Result<InstanceStatistics, Error> {
        self.require_instance(instance_id)?;
        let resp = self
            .command(instance_id, MessageType::GetStatistics, json!({"instance_id": instance_id}))
            .await?;
        let data = resp.payload.get("data").cloned().unwrap_or(Value::Null);
        serde_json::from_value(data)
            .map_err(|e| Error::internal(format!("malformed statistics payload: {e}")))
    }

    async fn get_last_frame(&self, instance_id: &str) -> Result<Value, Error> {
        self.require_instance(instance_id)?;
        let resp = self
            .command(instance_id, MessageType::GetLastFrame, json!({"instance_id": instance_id}))
            .await?;
        Ok(resp.payload.get("data").cloned().unwrap_or(Value::Null))
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

            let config = match serde_json::to_value(info.to_request()) {
                Ok(config) => config,
                Err(e) => {
                    warn!(instance = %instance_id, error = %e, "config rebuild failed");
                    continue;
                }
            };
            if let Err(e) = self.supervisor.spawn_worker(&instance_id, &config).await {
                error!(instance = %instance_id, error = %e, "worker spawn failed at load");
                continue;
            }

            let auto_start = info.auto_start;
            self.instances.lock().insert(instance_id.clone(), info);
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
            let instances = self.instances.lock();
            instances
                .iter()
                .filter(|(_, info)| info.retry_count > self.max_retries && info.running)
                .map(|(id, _)| id.clone())
                .collect()
        };

        let mut stopped = 0;
        for instance_id in over_limit {
            let _guard = self.locks.acquire(&instance_id).await;
            let _ = self.stop_inner(&instance_id).await;
            if let Some(info) = self.instances.lock().get_mut(&instance_id) {
                info.retry_limit_reached = true;
            }
            warn!(instance = %instance_id, "stopped: retry limit exceeded");
            stopped += 1;
        }
        stopped
    }

    async fn shutdown(&self) {
        self.supervisor.stop().await;
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
