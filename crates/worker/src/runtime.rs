// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker process entry: argument parsing, dependency init, server
//! lifetime, shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;
use tracing::{error, info, warn};

use ea_solution::SolutionRegistry;
use ea_wire::WorkerServer;

use crate::handler::WorkerHandler;
use crate::watcher::ConfigFileWatcher;

/// `edge_ai_worker --instance-id <UUID> --socket <path> --config <json>`
#[derive(Debug, Parser)]
#[command(name = "edge_ai_worker", about = "Per-instance pipeline worker")]
pub struct WorkerArgs {
    /// Instance this worker owns.
    #[arg(long)]
    pub instance_id: String,

    /// Unix socket path to serve IPC on.
    #[arg(long)]
    pub socket: PathBuf,

    /// Initial instance config as a JSON string.
    #[arg(long)]
    pub config: String,

    /// Optional config file to watch for hot changes.
    #[arg(long)]
    pub config_file: Option<PathBuf>,
}

/// Run the worker until shutdown. Returns the process exit code:
/// 0 on clean shutdown, 1 on argument or dependency-init failure.
pub async fn run(args: WorkerArgs) -> i32 {
    let config: Value = match serde_json::from_str(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("edge_ai_worker: invalid --config JSON: {e}");
            return 1;
        }
    };

    info!(instance = %args.instance_id, socket = %args.socket.display(), "worker starting");

    // Dependency init: built-in solutions and the pipeline bootstrap.
    let registry = SolutionRegistry::new();
    registry.initialize_defaults();
    ea_pipeline::bootstrap();

    let handler = WorkerHandler::new(&args.instance_id, config, registry);
    let shutdown = handler.shutdown_token();

    // Build the initial pipeline when the config already names a solution.
    // Failure is not fatal: the worker stays up, reports the error, and a
    // later UPDATE can fix the config.
    if let Err(e) = handler.build_initial_pipeline() {
        warn!(error = %e, "initial pipeline build failed");
    }

    let mut server = match WorkerServer::bind(&args.socket) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("edge_ai_worker: failed to prepare socket: {e}");
            return 1;
        }
    };
    if let Err(e) = server.start(Arc::new(handler.clone())) {
        eprintln!("edge_ai_worker: failed to start IPC server: {e}");
        return 1;
    }

    // External config edits feed the same hot-apply path as UPDATE.
    let mut watcher = args.config_file.as_ref().map(|path| {
        let mut watcher = ConfigFileWatcher::new(path);
        let handler = handler.clone();
        let runtime = tokio::runtime::Handle::current();
        watcher.start(Box::new(move |changed: &std::path::Path| {
            let handler = handler.clone();
            let changed = changed.to_path_buf();
            runtime.spawn(async move {
                match std::fs::read_to_string(&changed)
                    .map_err(|e| e.to_string())
                    .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|e| e.to_string()))
                {
                    Ok(new_config) => {
                        if let Err(e) = handler.apply_config(new_config).await {
                            error!(error = %e, "config file apply failed");
                        }
                    }
                    Err(e) => error!(error = %e, "unreadable config file change ignored"),
                }
            });
        }));
        watcher
    });

    // Serve until SHUTDOWN/DELETE over IPC or a termination signal.
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(signal) => signal,
        Err(e) => {
            eprintln!("edge_ai_worker: failed to install signal handler: {e}");
            return 1;
        }
    };
    tokio::select! {
        _ = shutdown.cancelled() => info!("shutdown requested over IPC"),
        _ = sigterm.recv() => info!("SIGTERM received"),
        _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
    }

    // Orderly teardown: watcher, pipeline, server, socket.
    if let Some(watcher) = watcher.as_mut() {
        watcher.stop().await;
    }
    handler.wait_start_settled().await;
    handler.wait_stop_settled().await;
    handler.stop_pipeline_now();
    server.stop().await;

    info!(instance = %args.instance_id, "worker exited cleanly");
    0
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
