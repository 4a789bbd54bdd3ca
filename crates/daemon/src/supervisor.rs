// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker supervisor: spawns one subprocess per instance, monitors
//! liveness over PING/PONG, and drives the bounded-restart policy.
//!
//! One mutex guards the worker map; IPC calls always happen with the lock
//! released (the client handle is shared, the record only tracks state).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ea_core::Error;
use ea_wire::{IpcMessage, MessageType, WorkerClient};

/// Worker subprocess lifecycle state.
///
/// Transitions are monotonic except the restart path Crashed → Starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Ready,
    Busy,
    Stopping,
    Stopped,
    Crashed,
}

/// Supervisor tuning. Defaults come from the environment so tests can
/// shrink every window.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub max_restarts: u32,
    pub restart_delay: Duration,
    pub startup_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            heartbeat_interval: ea_core::env::heartbeat_interval(),
            heartbeat_timeout: ea_core::env::heartbeat_timeout(),
            max_restarts: ea_core::env::max_restarts(),
            restart_delay: ea_core::env::restart_delay(),
            startup_timeout: ea_core::env::startup_timeout(),
        }
    }
}

/// Per-worker record. At most one per instance id.
struct WorkerRecord {
    pid: Option<u32>,
    state: WorkerState,
    socket_path: PathBuf,
    client: Arc<WorkerClient>,
    child: tokio::process::Child,
    #[allow(dead_code)]
    start_time: Instant,
    last_heartbeat: Instant,
    restart_count: u32,
    last_error: String,
}

/// Snapshot of a record for callers (no client, no child).
#[derive(Debug, Clone)]
pub struct WorkerSnapshot {
    pub instance_id: String,
    pub pid: Option<u32>,
    pub state: WorkerState,
    pub socket_path: PathBuf,
    pub restart_count: u32,
    pub last_error: String,
}

type StateCallback = Arc<dyn Fn(&str, WorkerState, WorkerState) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

pub struct WorkerSupervisor {
    worker_executable: String,
    config: SupervisorConfig,
    workers: Arc<Mutex<HashMap<String, WorkerRecord>>>,
    state_callback: Mutex<Option<StateCallback>>,
    error_callback: Mutex<Option<ErrorCallback>>,
    cancel: CancellationToken,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerSupervisor {
    pub fn new(worker_executable: &str) -> Self {
        Self::with_config(worker_executable, SupervisorConfig::default())
    }

    pub fn with_config(worker_executable: &str, config: SupervisorConfig) -> Self {
        WorkerSupervisor {
            worker_executable: worker_executable.to_string(),
            config,
            workers: Arc::new(Mutex::new(HashMap::new())),
            state_callback: Mutex::new(None),
            error_callback: Mutex::new(None),
            cancel: CancellationToken::new(),
            monitor: Mutex::new(None),
        }
    }

    /// Set the state-change callback. Call before [`start`].
    pub fn set_state_change_callback(
        &self,
        callback: impl Fn(&str, WorkerState, WorkerState) + Send + Sync + 'static,
    ) {
        *self.state_callback.lock() = Some(Arc::new(callback));
    }

    /// Set the error callback. Call before [`start`].
    pub fn set_error_callback(&self, callback: impl Fn(&str, &str) + Send + Sync + 'static) {
        *self.error_callback.lock() = Some(Arc::new(callback));
    }

    /// Start the monitor loop.
    pub fn start(self: &Arc<Self>) {
        let mut monitor = self.monitor.lock();
        if monitor.is_some() {
            return;
        }
        let supervisor = Arc::clone(self);
        *monitor = Some(tokio::spawn(async move {
            supervisor.monitor_loop().await;
        }));
        info!("supervisor started");
    }

    /// Stop the monitor and terminate every worker, graceful first.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let ids = self.worker_ids();
        for id in &ids {
            let _ = self.terminate_worker(id, false).await;
        }
        for id in &ids {
            let _ = self.terminate_worker(id, true).await;
        }
        let task = self.monitor.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        info!("supervisor stopped");
    }

    fn fire_state_change(&self, instance_id: &str, old: WorkerState, new: WorkerState) {
        if old == new {
            return;
        }
        let callback = self.state_callback.lock().clone();
        if let Some(callback) = callback {
            callback(instance_id, old, new);
        }
    }

    fn fire_error(&self, instance_id: &str, error: &str) {
        let callback = self.error_callback.lock().clone();
        if let Some(callback) = callback {
            callback(instance_id, error);
        }
    }

    fn set_state(&self, instance_id: &str, new: WorkerState) {
        let old = {
            let mut workers = self.workers.lock();
            match workers.get_mut(instance_id) {
                Some(record) => {
                    let old = record.state;
                    record.state = new;
                    old
                }
                None => return,
            }
        };
        self.fire_state_change(instance_id, old, new);
    }

    /// Spawn a worker for an instance and wait for it to report ready.
    ///
    /// A leftover record in Stopped or Crashed state is replaced (the
    /// restart path); any other existing record is an error.
    pub async fn spawn_worker(&self, instance_id: &str, config: &Value) -> Result<(), Error> {
        // A respawn inherits the previous record's restart counter so the
        // bounded-restart policy counts spawn attempts, not records.
        let restart_count = {
            let mut workers = self.workers.lock();
            match workers.get(instance_id).map(|r| r.state) {
                None => 0,
                Some(WorkerState::Stopped | WorkerState::Crashed) => {
                    workers.remove(instance_id).map_or(0, |r| r.restart_count)
                }
                Some(state) => {
                    return Err(Error::AlreadyExists(format!(
                        "worker already exists for {instance_id} (state {state:?})"
                    )));
                }
            }
        };

        let exe = resolve_worker_executable(&self.worker_executable).ok_or_else(|| {
            Error::Subprocess(format!("worker executable not found: {}", self.worker_executable))
        })?;

        let socket_path = prepare_socket_path(instance_id)?;
        let config_str = serde_json::to_string(config)
            .map_err(|e| Error::internal(format!("config serialization failed: {e}")))?;

        let child = tokio::process::Command::new(&exe)
            .arg("--instance-id")
            .arg(instance_id)
            .arg("--socket")
            .arg(&socket_path)
            .arg("--config")
            .arg(&config_str)
            .stdin(std::process::Stdio::null())
            .spawn()
            .map_err(|e| Error::Subprocess(format!("failed to spawn worker: {e}")))?;

        let pid = child.id();
        info!(instance = instance_id, pid, exe = %exe.display(), "worker spawned");

        {
            let mut workers = self.workers.lock();
            workers.insert(
                instance_id.to_string(),
                WorkerRecord {
                    pid,
                    state: WorkerState::Starting,
                    socket_path: socket_path.clone(),
                    client: Arc::new(WorkerClient::new(&socket_path)),
                    child,
                    start_time: Instant::now(),
                    last_heartbeat: Instant::now(),
                    restart_count,
                    last_error: String::new(),
                },
            );
        }

        match self.wait_for_ready(instance_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Kill whatever is left and drop the record.
                let record = self.workers.lock().remove(instance_id);
                if let Some(mut record) = record {
                    let _ = record.child.start_kill();
                    let _ = record.child.wait().await;
                    record.client.disconnect().await;
                    let _ = std::fs::remove_file(&record.socket_path);
                }
                Err(e)
            }
        }
    }

    /// Poll with exponential backoff (100 ms doubling, capped at 1 s) until
    /// the worker connects and sends WORKER_READY, or the startup timeout
    /// expires.
    async fn wait_for_ready(&self, instance_id: &str) -> Result<(), Error> {
        let deadline = Instant::now() + self.config.startup_timeout;
        let mut retry_delay = Duration::from_millis(100);

        loop {
            if Instant::now() > deadline {
                return Err(Error::Subprocess(format!(
                    "worker {instance_id} did not become ready within {:?}",
                    self.config.startup_timeout
                )));
            }

            // Reap a premature exit first.
            let (client, exited) = {
                let mut workers = self.workers.lock();
                let record = workers
                    .get_mut(instance_id)
                    .ok_or_else(|| Error::Subprocess("worker record disappeared".into()))?;
                let exited = matches!(record.child.try_wait(), Ok(Some(_)));
                (Arc::clone(&record.client), exited)
            };
            if exited {
                return Err(Error::Subprocess(format!(
                    "worker {instance_id} exited during startup"
                )));
            }

            if !client.is_connected() {
                if client.connect(Duration::from_secs(1)).await.is_ok() {
                    // Connected: the first frame must be WORKER_READY.
                    match client.receive(Duration::from_secs(5)).await {
                        Ok(msg) if msg.msg_type == MessageType::WorkerReady => {
                            {
                                let mut workers = self.workers.lock();
                                if let Some(record) = workers.get_mut(instance_id) {
                                    record.last_heartbeat = Instant::now();
                                }
                            }
                            self.set_state(instance_id, WorkerState::Ready);
                            info!(instance = instance_id, "worker ready");
                            return Ok(());
                        }
                        Ok(msg) => {
                            warn!(instance = instance_id, msg_type = ?msg.msg_type,
                                  "unexpected first frame, still waiting");
                        }
                        Err(e) => {
                            debug!(instance = instance_id, error = %e, "ready receive failed");
                            client.disconnect().await;
                        }
                    }
                }
            }

            tokio::time::sleep(retry_delay).await;
            retry_delay = (retry_delay * 2).min(Duration::from_secs(1));
        }
    }

    /// Request/response with one worker. Requires Ready or Busy; the worker
    /// is Busy for the duration of the call.
    pub async fn send_to_worker(
        &self,
        instance_id: &str,
        msg: &IpcMessage,
        timeout: Duration,
    ) -> Result<IpcMessage, Error> {
        let client = {
            let mut workers = self.workers.lock();
            let record = workers
                .get_mut(instance_id)
                .ok_or_else(|| Error::not_found(format!("worker not found: {instance_id}")))?;
            if !matches!(record.state, WorkerState::Ready | WorkerState::Busy) {
                return Err(Error::Subprocess(format!(
                    "worker {instance_id} not ready (state {:?})",
                    record.state
                )));
            }
            if !record.client.is_connected() {
                return Err(Error::Transport(format!("worker {instance_id} not connected")));
            }
            record.state = WorkerState::Busy;
            Arc::clone(&record.client)
        };

        let result = client.send_and_receive(msg, timeout).await;
        {
            // Any response is proof of life.
            let mut workers = self.workers.lock();
            if let Some(record) = workers.get_mut(instance_id) {
                if result.is_ok() {
                    record.last_heartbeat = Instant::now();
                }
            }
        }
        self.set_state(instance_id, WorkerState::Ready);

        result.map_err(|e| Error::Transport(e.to_string()))
    }

    pub fn worker_state(&self, instance_id: &str) -> WorkerState {
        self.workers.lock().get(instance_id).map_or(WorkerState::Stopped, |r| r.state)
    }

    pub fn is_worker_ready(&self, instance_id: &str) -> bool {
        self.worker_state(instance_id) == WorkerState::Ready
    }

    pub fn worker_ids(&self) -> Vec<String> {
        self.workers.lock().keys().cloned().collect()
    }

    pub fn worker_info(&self, instance_id: &str) -> Option<WorkerSnapshot> {
        self.workers.lock().get(instance_id).map(|record| WorkerSnapshot {
            instance_id: instance_id.to_string(),
            pid: record.pid,
            state: record.state,
            socket_path: record.socket_path.clone(),
            restart_count: record.restart_count,
            last_error: record.last_error.clone(),
        })
    }

    /// Terminate one worker. Graceful: SHUTDOWN over IPC, up to ~1 s for a
    /// clean exit, then SIGTERM. Forced: SIGKILL immediately. The socket is
    /// unlinked and the record removed either way.
    pub async fn terminate_worker(&self, instance_id: &str, force: bool) -> bool {
        let record = self.workers.lock().remove(instance_id);
        let Some(mut record) = record else {
            return false;
        };
        self.fire_state_change(instance_id, record.state, WorkerState::Stopping);

        if !force && record.client.is_connected() {
            let _ = record.client.send(&IpcMessage::new(MessageType::Shutdown)).await;
            for _ in 0..10 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                if let Ok(Some(status)) = record.child.try_wait() {
                    info!(instance = instance_id, ?status, "worker exited gracefully");
                    self.cleanup_record(instance_id, record).await;
                    return true;
                }
            }
        }

        if force {
            let _ = record.child.start_kill();
        } else if let Some(pid) = record.pid {
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid as i32),
                nix::sys::signal::Signal::SIGTERM,
            );
        }
        let _ = tokio::time::timeout(Duration::from_secs(5), record.child.wait()).await;
        info!(instance = instance_id, force, "worker terminated");
        self.cleanup_record(instance_id, record).await;
        true
    }

    async fn cleanup_record(&self, instance_id: &str, record: WorkerRecord) {
        record.client.disconnect().await;
        if record.socket_path.exists() {
            let _ = std::fs::remove_file(&record.socket_path);
        }
        self.fire_state_change(instance_id, WorkerState::Stopping, WorkerState::Stopped);
    }

    /// Monitor loop: every heartbeat interval reap exits, ping the living,
    /// and mark the silent as crashed.
    async fn monitor_loop(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.heartbeat_interval) => {}
            }

            let mut crashed = Vec::new();
            let mut to_ping = Vec::new();
            {
                let mut workers = self.workers.lock();
                for (id, record) in workers.iter_mut() {
                    if !matches!(record.state, WorkerState::Ready | WorkerState::Busy) {
                        continue;
                    }
                    match record.child.try_wait() {
                        Ok(Some(status)) => {
                            warn!(instance = %id, ?status, "worker exited");
                            record.last_error = format!("worker exited: {status}");
                            crashed.push(id.clone());
                        }
                        _ => {
                            // A Busy worker is mid-exchange with a caller;
                            // pinging it would race that caller's reply.
                            if record.state == WorkerState::Ready && record.client.is_connected() {
                                to_ping.push((id.clone(), Arc::clone(&record.client)));
                            }
                        }
                    }
                }
            }
            for id in &crashed {
                self.set_state(id, WorkerState::Crashed);
            }

            for (id, client) in to_ping {
                let pong = client
                    .send_and_receive(&IpcMessage::new(MessageType::Ping), Duration::from_secs(5))
                    .await;
                let alive = matches!(&pong, Ok(msg) if msg.msg_type == MessageType::Pong);
                let mut timed_out = false;
                {
                    let mut workers = self.workers.lock();
                    if let Some(record) = workers.get_mut(&id) {
                        if alive {
                            record.last_heartbeat = Instant::now();
                        } else if record.last_heartbeat.elapsed() > self.config.heartbeat_timeout {
                            warn!(instance = %id, "heartbeat timeout");
                            record.last_error = "heartbeat timeout".to_string();
                            timed_out = true;
                        }
                    }
                }
                if timed_out {
                    self.set_state(&id, WorkerState::Crashed);
                    crashed.push(id);
                }
            }

            // Crash handling happens with the map lock released.
            for id in crashed {
                self.handle_worker_crash(&id).await;
            }
        }
    }

    /// Crash policy: below the restart limit the record is cleaned up and
    /// parked in Stopped for the manager to respawn from persisted config;
    /// at the limit the record is removed and one terminal error fires.
    async fn handle_worker_crash(&self, instance_id: &str) {
        let error = self
            .workers
            .lock()
            .get(instance_id)
            .map(|r| r.last_error.clone())
            .unwrap_or_else(|| "worker crashed".to_string());
        self.fire_error(instance_id, &format!("worker crashed: {error}"));

        let under_limit = {
            let workers = self.workers.lock();
            match workers.get(instance_id) {
                Some(record) => record.restart_count < self.config.max_restarts,
                None => return,
            }
        };

        if under_limit {
            // Clean up the dead process's client and socket but keep the
            // record so the restart counter survives.
            {
                let mut workers = self.workers.lock();
                if let Some(record) = workers.get_mut(instance_id) {
                    if record.socket_path.exists() {
                        let _ = std::fs::remove_file(&record.socket_path);
                    }
                    record.pid = None;
                }
            }
            tokio::time::sleep(self.config.restart_delay).await;
            let attempt = {
                let mut workers = self.workers.lock();
                match workers.get_mut(instance_id) {
                    Some(record) => {
                        record.restart_count += 1;
                        record.restart_count
                    }
                    None => return,
                }
            };
            info!(
                instance = instance_id,
                attempt,
                max = self.config.max_restarts,
                "worker parked for respawn"
            );
            self.set_state(instance_id, WorkerState::Stopped);
        } else {
            let record = self.workers.lock().remove(instance_id);
            if let Some(record) = record {
                record.client.disconnect().await;
                if record.socket_path.exists() {
                    let _ = std::fs::remove_file(&record.socket_path);
                }
            }
            error!(instance = instance_id, "max restarts reached, giving up");
            self.fire_error(
                instance_id,
                &format!(
                    "worker {instance_id} exceeded max restarts ({}), giving up",
                    self.config.max_restarts
                ),
            );
        }
    }
}

/// Resolve the worker executable: absolute path, sibling of the current
/// binary, `PATH`, then the working directory.
fn resolve_worker_executable(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.is_absolute() {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    if let Ok(current) = std::env::current_exe() {
        if let Some(dir) = current.parent() {
            let sibling = dir.join(name);
            if sibling.is_file() {
                return Some(sibling);
            }
        }
    }

    if let Some(path_var) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }

    let cwd_candidate = Path::new(".").join(name);
    cwd_candidate.is_file().then_some(cwd_candidate)
}

/// Per-instance socket path under the run directory, falling back to the
/// temp dir when the run directory cannot be created. Stale sockets are
/// removed.
fn prepare_socket_path(instance_id: &str) -> Result<PathBuf, Error> {
    let preferred = ea_core::env::worker_socket_path(instance_id);
    let path = match preferred.parent() {
        Some(dir) if std::fs::create_dir_all(dir).is_ok() => preferred,
        _ => {
            let fallback = std::env::temp_dir().join(format!("edge_ai_worker_{instance_id}.sock"));
            warn!(fallback = %fallback.display(), "run directory unavailable, using temp dir");
            fallback
        }
    };
    if path.exists() {
        std::fs::remove_file(&path)
            .map_err(|e| Error::Subprocess(format!("cannot remove stale socket: {e}")))?;
    }
    Ok(path)
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
