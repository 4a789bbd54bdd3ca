// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unit tests for supervisor plumbing that needs no real worker binary.
//! End-to-end spawn/crash/restart coverage lives in `tests/subprocess_e2e.rs`.

use serde_json::json;
use serial_test::serial;

use super::*;

#[tokio::test]
async fn unknown_worker_is_stopped() {
    let supervisor = WorkerSupervisor::new("edge_ai_worker");
    assert_eq!(supervisor.worker_state("missing"), WorkerState::Stopped);
    assert!(!supervisor.is_worker_ready("missing"));
    assert!(supervisor.worker_ids().is_empty());
    assert!(supervisor.worker_info("missing").is_none());
}

#[tokio::test]
async fn spawn_with_missing_executable_fails() {
    let supervisor = WorkerSupervisor::new("/nonexistent/edge_ai_worker_binary");
    let err = supervisor.spawn_worker("some-id", &json!({})).await.unwrap_err();
    assert!(matches!(err, Error::Subprocess(_)), "{err:?}");
    assert!(supervisor.worker_ids().is_empty(), "no record left behind");
}

#[tokio::test]
async fn send_to_unknown_worker_is_not_found() {
    let supervisor = WorkerSupervisor::new("edge_ai_worker");
    let err = supervisor
        .send_to_worker("missing", &IpcMessage::new(MessageType::Ping), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "{err:?}");
}

#[tokio::test]
async fn terminate_unknown_worker_is_false() {
    let supervisor = WorkerSupervisor::new("edge_ai_worker");
    assert!(!supervisor.terminate_worker("missing", false).await);
}

#[test]
#[serial]
fn socket_path_prefers_run_dir_and_clears_stale_sockets() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("EDGE_AI_SOCKET_DIR", dir.path());

    let path = prepare_socket_path("abc-123").unwrap();
    assert_eq!(path, dir.path().join("edge_ai_worker_abc-123.sock"));

    std::fs::write(&path, b"stale").unwrap();
    let path = prepare_socket_path("abc-123").unwrap();
    assert!(!path.exists(), "stale socket removed");

    std::env::remove_var("EDGE_AI_SOCKET_DIR");
}

#[test]
fn executable_resolution_absolute_only_when_present() {
    assert!(resolve_worker_executable("/definitely/not/here").is_none());
    // A name that exists nowhere resolves to nothing.
    assert!(resolve_worker_executable("edge_ai_worker_does_not_exist_xyz").is_none());
}
