// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use super::*;

#[test]
fn parses_required_arguments() {
    let args = WorkerArgs::try_parse_from([
        "edge_ai_worker",
        "--instance-id",
        "550e8400-e29b-41d4-a716-446655440000",
        "--socket",
        "/tmp/w.sock",
        "--config",
        "{}",
    ])
    .unwrap();
    assert_eq!(args.instance_id, "550e8400-e29b-41d4-a716-446655440000");
    assert_eq!(args.socket, std::path::PathBuf::from("/tmp/w.sock"));
    assert!(args.config_file.is_none());
}

#[test]
fn missing_arguments_fail_parsing() {
    assert!(WorkerArgs::try_parse_from(["edge_ai_worker"]).is_err());
    assert!(WorkerArgs::try_parse_from(["edge_ai_worker", "--instance-id", "x"]).is_err());
}
