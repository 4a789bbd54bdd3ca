// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC command handling for the worker process.
//!
//! Locking discipline: the small {state, last_error} pair sits behind a
//! shared-read/exclusive-write lock so statistics and status reads never
//! block behind a state transition; the pipeline, the frame cache, and the
//! swap path each have their own lock to keep critical sections short.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use base64::Engine;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use ea_core::{CreateInstanceRequest, Error, InstanceStatistics};
use ea_pipeline::{build_pipeline, Pipeline};
use ea_solution::SolutionRegistry;
use ea_wire::{
    error_response, response, response_data, IpcMessage, MessageHandler, MessageType,
    ResponseStatus,
};

use crate::frame::{FpsWindow, FrameCache, FrameData};
use crate::update::{plan_update, UpdatePlan};

struct SmallState {
    state: String,
    last_error: String,
}

struct Inner {
    instance_id: String,
    registry: SolutionRegistry,

    config: Mutex<Value>,
    small: RwLock<SmallState>,
    pipeline: Mutex<Option<Pipeline>>,

    // Hot swap: at most one replacement build at a time.
    swap: tokio::sync::Mutex<()>,
    building_new: AtomicBool,

    starting: AtomicBool,
    stopping: AtomicBool,
    start_done: tokio::sync::Notify,
    stop_done: tokio::sync::Notify,

    started_at: Instant,
    frames_processed: AtomicU64,
    dropped_frames: AtomicU64,
    queue_size: AtomicU64,
    fps: FpsWindow,
    frame_cache: FrameCache,

    shutdown: CancellationToken,
}

/// Handles every IPC command for one instance. Cheap to clone; clones share
/// the same state.
#[derive(Clone)]
pub struct WorkerHandler {
    inner: Arc<Inner>,
}

impl WorkerHandler {
    pub fn new(instance_id: &str, config: Value, registry: SolutionRegistry) -> Self {
        WorkerHandler {
            inner: Arc::new(Inner {
                instance_id: instance_id.to_string(),
                registry,
                config: Mutex::new(config),
                small: RwLock::new(SmallState {
                    state: "stopped".to_string(),
                    last_error: String::new(),
                }),
                pipeline: Mutex::new(None),
                swap: tokio::sync::Mutex::new(()),
                building_new: AtomicBool::new(false),
                starting: AtomicBool::new(false),
                stopping: AtomicBool::new(false),
                start_done: tokio::sync::Notify::new(),
                stop_done: tokio::sync::Notify::new(),
                started_at: Instant::now(),
                frames_processed: AtomicU64::new(0),
                dropped_frames: AtomicU64::new(0),
                queue_size: AtomicU64::new(0),
                fps: FpsWindow::new(),
                frame_cache: FrameCache::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.inner.instance_id
    }

    /// Token cancelled when a SHUTDOWN or DELETE command arrives.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    pub fn current_state(&self) -> String {
        self.inner.small.read().state.clone()
    }

    fn set_state(&self, state: &str) {
        let mut small = self.inner.small.write();
        small.state = state.to_string();
    }

    fn set_error(&self, message: &str) {
        let mut small = self.inner.small.write();
        small.state = "error".to_string();
        small.last_error = message.to_string();
    }

    fn request_from_config(config: &Value) -> Result<CreateInstanceRequest, Error> {
        serde_json::from_value(config.clone())
            .map_err(|e| Error::validation(format!("malformed instance config: {e}")))
    }

    /// Build the pipeline from the current config if a solution is named.
    /// Called once at startup; errors leave the worker alive but errored.
    pub fn build_initial_pipeline(&self) -> Result<(), Error> {
        let config = self.inner.config.lock().clone();
        let request = Self::request_from_config(&config)?;
        if request.solution.is_empty() {
            return Ok(());
        }
        let pipeline = self.build_from_request(&request)?;
        *self.inner.pipeline.lock() = Some(pipeline);
        info!(instance = %self.inner.instance_id, "initial pipeline built");
        Ok(())
    }

    fn build_from_request(&self, request: &CreateInstanceRequest) -> Result<Pipeline, Error> {
        let solution = self
            .inner
            .registry
            .get(&request.solution)
            .ok_or_else(|| Error::not_found(format!("solution not found: {}", request.solution)))?;
        build_pipeline(&solution, request, &self.inner.instance_id).map_err(Error::from)
    }

    /// Kick off the pipeline start in a background task so the IPC loop
    /// stays responsive to heartbeats; completion is signaled on
    /// `start_done`. A second start while one is in flight is rejected.
    fn start_pipeline_async(&self) -> Result<(), Error> {
        if self.inner.starting.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyExists("pipeline start already in progress".into()));
        }
        if self.inner.pipeline.lock().as_ref().is_some_and(Pipeline::is_running) {
            self.inner.starting.store(false, Ordering::Release);
            return Ok(());
        }

        let handler = self.clone();
        tokio::spawn(async move {
            let result = handler.start_pipeline_blocking();
            match result {
                Ok(()) => handler.set_state("running"),
                Err(e) => {
                    error!(error = %e, "pipeline start failed");
                    handler.set_error(&e.to_string());
                }
            }
            handler.inner.starting.store(false, Ordering::Release);
            handler.inner.start_done.notify_waiters();
        });
        Ok(())
    }

    fn start_pipeline_blocking(&self) -> Result<(), Error> {
        // Build lazily: a worker spawned without a solution gets one via
        // CREATE/UPDATE before start.
        {
            let needs_build = self.inner.pipeline.lock().is_none();
            if needs_build {
                let config = self.inner.config.lock().clone();
                let request = Self::request_from_config(&config)?;
                if request.solution.is_empty() {
                    return Err(Error::validation("no solution configured"));
                }
                let pipeline = self.build_from_request(&request)?;
                *self.inner.pipeline.lock() = Some(pipeline);
            }
        }
        let mut guard = self.inner.pipeline.lock();
        match guard.as_mut() {
            Some(pipeline) => pipeline.start(),
            None => Err(Error::internal("pipeline disappeared during start")),
        }
    }

    fn stop_pipeline_async(&self) -> Result<(), Error> {
        if self.inner.stopping.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyExists("pipeline stop already in progress".into()));
        }
        let handler = self.clone();
        tokio::spawn(async move {
            if let Some(pipeline) = handler.inner.pipeline.lock().as_mut() {
                pipeline.stop();
            }
            handler.set_state("stopped");
            handler.inner.stopping.store(false, Ordering::Release);
            handler.inner.stop_done.notify_waiters();
        });
        Ok(())
    }

    /// Stop synchronously; used on the shutdown path.
    pub fn stop_pipeline_now(&self) {
        if let Some(pipeline) = self.inner.pipeline.lock().as_mut() {
            pipeline.stop();
        }
        self.set_state("stopped");
    }

    /// Wait until an in-flight start settles (tests and shutdown).
    pub async fn wait_start_settled(&self) {
        while self.inner.starting.load(Ordering::Acquire) {
            let notified = self.inner.start_done.notified();
            tokio::pin!(notified);
            // Register before re-checking so a completion between the check
            // and the await cannot be missed.
            notified.as_mut().enable();
            if !self.inner.starting.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }

    /// Wait until an in-flight stop settles.
    pub async fn wait_stop_settled(&self) {
        while self.inner.stopping.load(Ordering::Acquire) {
            let notified = self.inner.stop_done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.inner.stopping.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }

    /// Apply a config change: in place when possible, hot swap otherwise.
    pub async fn apply_config(&self, new_config: Value) -> Result<&'static str, Error> {
        let old_config = self.inner.config.lock().clone();
        match plan_update(&old_config, &new_config) {
            UpdatePlan::NoChange => {
                *self.inner.config.lock() = merged(old_config, new_config);
                Ok("no pipeline change")
            }
            UpdatePlan::InPlace(deltas) => {
                {
                    let mut guard = self.inner.pipeline.lock();
                    if let Some(pipeline) = guard.as_mut() {
                        for (key, value) in &deltas {
                            let applied = pipeline.set_param(key, value);
                            info!(key = %key, value = %value, applied, "applied node parameter");
                        }
                    }
                }
                *self.inner.config.lock() = merged(old_config, new_config);
                Ok("applied in place")
            }
            UpdatePlan::Rebuild => {
                self.hot_swap(new_config).await?;
                Ok("pipeline rebuilt")
            }
        }
    }

    /// Hot swap: pre-build the replacement pipeline, and only once it is
    /// ready stop the old one and swap. At most one replacement build may
    /// be in flight.
    async fn hot_swap(&self, new_config: Value) -> Result<(), Error> {
        let _guard = self.inner.swap.lock().await;
        self.inner.building_new.store(true, Ordering::Release);

        let result = (|| {
            let merged_config = merged(self.inner.config.lock().clone(), new_config);
            let request = Self::request_from_config(&merged_config)?;
            if request.solution.is_empty() {
                return Err(Error::validation("no solution configured"));
            }
            let new_pipeline = self.build_from_request(&request)?;
            Ok((merged_config, new_pipeline))
        })();

        self.inner.building_new.store(false, Ordering::Release);
        let (merged_config, mut new_pipeline) = result?;

        let was_running = {
            let mut guard = self.inner.pipeline.lock();
            let was_running = guard.as_ref().is_some_and(Pipeline::is_running);
            if let Some(old) = guard.as_mut() {
                old.stop();
            }
            if was_running {
                new_pipeline.start()?;
            }
            *guard = Some(new_pipeline);
            was_running
        };
        *self.inner.config.lock() = merged_config;

        info!(resumed = was_running, "hot swap complete");
        Ok(())
    }

    /// Feed one processed frame into the cache and counters. Wired to the
    /// pipeline's frame capture hook.
    pub fn record_frame(&self, frame: FrameData) {
        self.inner.frames_processed.fetch_add(1, Ordering::Relaxed);
        self.inner.fps.record();
        self.inner.frame_cache.update(Arc::new(frame));
    }

    pub fn record_dropped_frame(&self) {
        self.inner.dropped_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn statistics(&self) -> InstanceStatistics {
        let small = self.inner.small.read();
        InstanceStatistics {
            state: small.state.clone(),
            frames_processed: self.inner.frames_processed.load(Ordering::Relaxed),
            dropped_frames: self.inner.dropped_frames.load(Ordering::Relaxed),
            current_fps: self.inner.fps.fps(),
            queue_size: self.inner.queue_size.load(Ordering::Relaxed),
            uptime_seconds: self.inner.started_at.elapsed().as_secs(),
            resolution: String::new(),
            source_resolution: String::new(),
            last_error: small.last_error.clone(),
        }
    }

    fn handle_get_last_frame(&self) -> IpcMessage {
        match self.inner.frame_cache.latest() {
            Some((frame, age)) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&frame.data);
                IpcMessage::with_payload(
                    MessageType::GetLastFrameResponse,
                    response_data(
                        ResponseStatus::Ok,
                        "",
                        json!({
                            "frame": encoded,
                            "width": frame.width,
                            "height": frame.height,
                            "ageMs": age.as_millis() as u64,
                        }),
                    ),
                )
            }
            None => IpcMessage::with_payload(
                MessageType::GetLastFrameResponse,
                error_response("no frame captured yet", ResponseStatus::NotFound),
            ),
        }
    }

    fn error_reply(msg_type: MessageType, e: &Error) -> IpcMessage {
        let status = match e {
            Error::Validation(_) => ResponseStatus::InvalidRequest,
            Error::NotFound(_) => ResponseStatus::NotFound,
            Error::AlreadyExists(_) => ResponseStatus::AlreadyExists,
            Error::Transport(_) => ResponseStatus::Error,
            Error::Conflict(_) => ResponseStatus::Error,
            Error::Subprocess(_) | Error::Pipeline(_) => ResponseStatus::Error,
            Error::Internal(_) => ResponseStatus::InternalError,
        };
        IpcMessage::with_payload(msg_type, error_response(&e.to_string(), status))
    }
}

#[async_trait]
impl MessageHandler for WorkerHandler {
    async fn handle(&self, msg: IpcMessage) -> IpcMessage {
        match msg.msg_type {
            MessageType::Ping => IpcMessage::new(MessageType::Pong),

            MessageType::Shutdown => {
                info!(instance = %self.inner.instance_id, "shutdown requested");
                self.inner.shutdown.cancel();
                IpcMessage::with_payload(
                    MessageType::ShutdownAck,
                    response(ResponseStatus::Ok, "shutting down"),
                )
            }

            MessageType::CreateInstance => {
                let config = msg.payload.get("config").cloned().unwrap_or(Value::Null);
                if !config.is_object() {
                    return Self::error_reply(
                        MessageType::CreateInstanceResponse,
                        &Error::validation("missing config object"),
                    );
                }
                *self.inner.config.lock() = config;
                match self.build_initial_pipeline() {
                    Ok(()) => IpcMessage::with_payload(
                        MessageType::CreateInstanceResponse,
                        response(ResponseStatus::Ok, "instance configured"),
                    ),
                    Err(e) => Self::error_reply(MessageType::CreateInstanceResponse, &e),
                }
            }

            MessageType::DeleteInstance => {
                self.stop_pipeline_now();
                self.inner.shutdown.cancel();
                IpcMessage::with_payload(
                    MessageType::DeleteInstanceResponse,
                    response(ResponseStatus::Ok, "instance deleted"),
                )
            }

            MessageType::StartInstance => match self.start_pipeline_async() {
                Ok(()) => IpcMessage::with_payload(
                    MessageType::StartInstanceResponse,
                    response(ResponseStatus::Ok, "pipeline start initiated"),
                ),
                Err(e) => Self::error_reply(MessageType::StartInstanceResponse, &e),
            },

            MessageType::StopInstance => match self.stop_pipeline_async() {
                Ok(()) => IpcMessage::with_payload(
                    MessageType::StopInstanceResponse,
                    response(ResponseStatus::Ok, "pipeline stop initiated"),
                ),
                Err(e) => Self::error_reply(MessageType::StopInstanceResponse, &e),
            },

            MessageType::UpdateInstance => {
                let Some(config) = msg.payload.get("config").cloned() else {
                    return Self::error_reply(
                        MessageType::UpdateInstanceResponse,
                        &Error::validation("missing config object"),
                    );
                };
                match self.apply_config(config).await {
                    Ok(how) => IpcMessage::with_payload(
                        MessageType::UpdateInstanceResponse,
                        response(ResponseStatus::Ok, how),
                    ),
                    Err(e) => Self::error_reply(MessageType::UpdateInstanceResponse, &e),
                }
            }

            MessageType::GetInstanceStatus => {
                let small = self.inner.small.read();
                IpcMessage::with_payload(
                    MessageType::GetInstanceStatusResponse,
                    response_data(
                        ResponseStatus::Ok,
                        "",
                        json!({
                            "instanceId": self.inner.instance_id,
                            "state": small.state,
                            "lastError": small.last_error,
                            "uptimeSeconds": self.inner.started_at.elapsed().as_secs(),
                            "pid": std::process::id(),
                        }),
                    ),
                )
            }

            MessageType::GetStatistics => {
                let stats = self.statistics();
                let data = serde_json::to_value(&stats).unwrap_or(Value::Null);
                IpcMessage::with_payload(
                    MessageType::GetStatisticsResponse,
                    response_data(ResponseStatus::Ok, "", data),
                )
            }

            MessageType::GetLastFrame => self.handle_get_last_frame(),

            other => {
                warn!(msg_type = ?other, "unexpected message type");
                IpcMessage::with_payload(
                    MessageType::ErrorResponse,
                    error_response(
                        &format!("unexpected message type {:?}", other),
                        ResponseStatus::InvalidRequest,
                    ),
                )
            }
        }
    }

    async fn on_client_connected(&self) -> Option<IpcMessage> {
        Some(IpcMessage::with_payload(
            MessageType::WorkerReady,
            json!({"instance_id": self.inner.instance_id, "pid": std::process::id()}),
        ))
    }
}

/// Shallow-merge the new request-shaped config over the old one;
/// `additionalParams` merges key by key.
fn merged(old: Value, new: Value) -> Value {
    match (old, new) {
        (Value::Object(mut old_map), Value::Object(new_map)) => {
            for (key, value) in new_map {
                if key == "additionalParams" {
                    match (old_map.remove(&key), value) {
                        (Some(Value::Object(mut old_params)), Value::Object(new_params)) => {
                            for (k, v) in new_params {
                                old_params.insert(k, v);
                            }
                            old_map.insert(key, Value::Object(old_params));
                        }
                        (_, value) => {
                            old_map.insert(key, value);
                        }
                    }
                } else {
                    old_map.insert(key, value);
                }
            }
            Value::Object(old_map)
        }
        (old, new) => {
            if new.is_object() {
                new
            } else {
                old
            }
        }
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
