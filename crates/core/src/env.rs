// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! Every knob the control plane reads from the environment lives here so the
//! rest of the workspace never calls `std::env::var` directly.

use std::path::PathBuf;
use std::time::Duration;

/// Default run directory for per-instance worker sockets.
const DEFAULT_RUN_DIR: &str = "/opt/edge_ai_api/run";

/// Which instance manager backend runs pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Pipelines run in the manager's address space.
    InProcess,
    /// One isolated worker subprocess per instance.
    Subprocess,
}

/// Backend selection from `EDGE_AI_EXECUTION_MODE`. `subprocess`,
/// `isolated`, and `worker` (case-insensitive) select the subprocess
/// backend; anything else or unset selects in-process.
pub fn execution_mode() -> ExecutionMode {
    match std::env::var("EDGE_AI_EXECUTION_MODE") {
        Ok(v) => match v.to_ascii_lowercase().as_str() {
            "subprocess" | "isolated" | "worker" => ExecutionMode::Subprocess,
            _ => ExecutionMode::InProcess,
        },
        Err(_) => ExecutionMode::InProcess,
    }
}

/// Root state directory for persisted documents (`instances.json`,
/// `solutions.json`, `groups/`).
pub fn state_dir() -> PathBuf {
    match std::env::var("EDGE_AI_STATE_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from("/opt/edge_ai_api"),
    }
}

/// Directory for per-instance sockets: `EDGE_AI_SOCKET_DIR`, else the
/// run-directory default. Callers fall back to the temp dir when this
/// cannot be created.
pub fn socket_dir() -> PathBuf {
    match std::env::var("EDGE_AI_SOCKET_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(DEFAULT_RUN_DIR),
    }
}

/// Per-instance stream socket path under the run directory.
pub fn worker_socket_path(instance_id: &str) -> PathBuf {
    socket_dir().join(format!("edge_ai_worker_{instance_id}.sock"))
}

/// First location searched for model files.
pub fn data_root() -> Option<PathBuf> {
    std::env::var("CVEDIX_DATA_ROOT").ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// SDK root; its `cvedix_data` subtree is searched for model files.
pub fn sdk_root() -> Option<PathBuf> {
    std::env::var("CVEDIX_SDK_ROOT").ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Fallback RTSP source URL.
pub fn rtsp_url() -> Option<String> {
    std::env::var("RTSP_URL").ok().filter(|v| !v.is_empty())
}

/// Configured RTSP transport protocol, if any.
pub fn gst_rtsp_protocols() -> Option<String> {
    std::env::var("GST_RTSP_PROTOCOLS").ok().filter(|v| !v.is_empty())
}

/// Alternative name for the RTSP transport, honored when
/// `GST_RTSP_PROTOCOLS` is unset.
pub fn rtsp_transport() -> Option<String> {
    std::env::var("RTSP_TRANSPORT").ok().filter(|v| !v.is_empty())
}

/// OSD font override. Unset means the built-in default; explicitly empty
/// disables the font requirement (used by tests).
pub fn osd_font_path() -> Option<String> {
    std::env::var("OSD_DEFAULT_FONT_PATH").ok()
}

fn duration_from_env(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

/// Default timeout for one IPC request/response exchange.
pub fn ipc_timeout() -> Duration {
    duration_from_env("EDGE_AI_IPC_TIMEOUT_MS", Duration::from_secs(30))
}

/// Supervisor heartbeat interval (default 5 s).
pub fn heartbeat_interval() -> Duration {
    duration_from_env("EDGE_AI_HEARTBEAT_INTERVAL_MS", Duration::from_secs(5))
}

/// Supervisor heartbeat timeout (default 15 s).
pub fn heartbeat_timeout() -> Duration {
    duration_from_env("EDGE_AI_HEARTBEAT_TIMEOUT_MS", Duration::from_secs(15))
}

/// Maximum worker restarts before a crash is terminal (default 3).
pub fn max_restarts() -> u32 {
    std::env::var("EDGE_AI_MAX_RESTARTS").ok().and_then(|s| s.parse().ok()).unwrap_or(3)
}

/// Delay between a crash and the restart attempt (default 1 s).
pub fn restart_delay() -> Duration {
    duration_from_env("EDGE_AI_RESTART_DELAY_MS", Duration::from_secs(1))
}

/// How long a spawned worker may take to report ready (default 30 s).
pub fn startup_timeout() -> Duration {
    duration_from_env("EDGE_AI_STARTUP_TIMEOUT_MS", Duration::from_secs(30))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
