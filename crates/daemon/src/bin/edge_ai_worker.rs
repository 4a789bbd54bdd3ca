// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `edge_ai_worker` — per-instance pipeline worker.
//!
//! Spawned by the supervisor as
//! `edge_ai_worker --instance-id <UUID> --socket <path> --config <json>`.
//! Exits 0 on clean shutdown, 1 on argument or init errors.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ea_worker::WorkerArgs;

fn main() {
    let args = match WorkerArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("edge_ai_worker: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("edge_ai_worker: failed to start runtime: {e}");
            std::process::exit(1);
        }
    };
    let code = runtime.block_on(ea_worker::run(args));
    std::process::exit(code);
}
