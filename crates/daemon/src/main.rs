// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ead` — the edge-AI control-plane daemon.
//!
//! Wires the solution registry, instance storage, and the selected
//! instance-manager backend, loads persisted instances, and runs the
//! periodic retry sweep until terminated.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ea_daemon::{create_manager, GroupRegistry};
use ea_solution::SolutionRegistry;
use ea_storage::{GroupStorage, InstanceStorage, SolutionStorage};

/// Retry-limit sweep cadence.
const RETRY_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "ead", about = "Edge AI control-plane daemon")]
struct Args {
    /// State directory override (defaults to EDGE_AI_STATE_DIR).
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Worker executable name or path.
    #[arg(long, default_value = "edge_ai_worker")]
    worker: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let state_dir = args.state_dir.unwrap_or_else(ea_core::env::state_dir);
    if let Err(e) = std::fs::create_dir_all(&state_dir) {
        eprintln!("ead: cannot create state directory {}: {e}", state_dir.display());
        std::process::exit(1);
    }
    info!(state_dir = %state_dir.display(), "daemon starting");

    // Explicit bootstrap so nothing below races the SDK environment setup.
    ea_pipeline::bootstrap();

    let registry = Arc::new(SolutionRegistry::with_storage(SolutionStorage::new(&state_dir)));
    registry.initialize_defaults();
    registry.load_persisted();

    let storage = Arc::new(InstanceStorage::new(&state_dir));
    let groups = GroupRegistry::new(GroupStorage::new(&state_dir));
    info!(groups = groups.list().len(), "group registry ready");

    let manager = create_manager(Arc::clone(&registry), Arc::clone(&storage), &args.worker);
    let loaded = manager.load_persistent_instances().await;
    info!(loaded, "startup complete");

    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(signal) => signal,
        Err(e) => {
            eprintln!("ead: failed to install signal handler: {e}");
            std::process::exit(1);
        }
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("SIGINT received");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received");
                break;
            }
            _ = tokio::time::sleep(RETRY_SWEEP_INTERVAL) => {
                let stopped = manager.check_and_handle_retry_limits().await;
                if stopped > 0 {
                    warn!(stopped, "instances stopped by retry sweep");
                }
            }
        }
    }

    manager.shutdown().await;
    info!("daemon stopped");
}
