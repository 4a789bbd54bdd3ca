// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix socket server hosted by a worker process.
//!
//! Accepts at most one client at a time (the supervisor is the sole peer).
//! Each accepted connection runs a decode → handle → encode loop until the
//! client disconnects or a decode error closes the connection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UnixListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::frame::{read_message, write_message, FrameError};
use crate::message::IpcMessage;

/// Request handler invoked for every decoded message.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle one request and produce the response to write back.
    async fn handle(&self, msg: IpcMessage) -> IpcMessage;

    /// Called after a client connects. A returned message is pushed to the
    /// client before the request loop starts (the worker uses this to send
    /// WORKER_READY).
    async fn on_client_connected(&self) -> Option<IpcMessage> {
        None
    }
}

/// Socket server owning the listening socket and its accept task.
pub struct WorkerServer {
    socket_path: PathBuf,
    cancel: CancellationToken,
    accept_task: Option<JoinHandle<()>>,
}

impl WorkerServer {
    /// Bind at `path`, unlinking any stale socket first. The parent
    /// directory is created if missing; on permission failure the socket
    /// falls back to the temp directory under the same file name.
    pub fn bind(path: &Path) -> Result<Self, std::io::Error> {
        let socket_path = prepare_socket_path(path)?;
        Ok(WorkerServer {
            socket_path,
            cancel: CancellationToken::new(),
            accept_task: None,
        })
    }

    /// The path the server actually bound (may differ from the requested
    /// path after the temp-dir fallback).
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Start the accept loop.
    pub fn start(&mut self, handler: Arc<dyn MessageHandler>) -> Result<(), std::io::Error> {
        let listener = UnixListener::bind(&self.socket_path)?;
        info!(socket = %self.socket_path.display(), "IPC server listening");

        let cancel = self.cancel.clone();
        self.accept_task = Some(tokio::spawn(accept_loop(listener, handler, cancel)));
        Ok(())
    }

    /// Stop the accept loop and unlink the socket.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.accept_task.take() {
            let _ = task.await;
        }
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(error = %e, "failed to unlink socket");
            }
        }
    }
}

async fn accept_loop(
    listener: UnixListener,
    handler: Arc<dyn MessageHandler>,
    cancel: CancellationToken,
) {
    loop {
        let stream = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(e) => {
                    error!(error = %e, "accept error");
                    continue;
                }
            },
        };

        debug!("client connected");
        let (mut reader, mut writer) = stream.into_split();

        if let Some(msg) = handler.on_client_connected().await {
            if let Err(e) = write_message(&mut writer, &msg).await {
                warn!(error = %e, "failed to push greeting frame");
                continue;
            }
        }

        // One client at a time: serve this connection to completion before
        // accepting the next.
        loop {
            let msg = tokio::select! {
                _ = cancel.cancelled() => return,
                decoded = read_message(&mut reader) => match decoded {
                    Ok(msg) => msg,
                    Err(FrameError::ConnectionClosed) => {
                        debug!("client disconnected");
                        break;
                    }
                    Err(e) => {
                        // A malformed or oversized frame poisons the stream;
                        // close it and let the peer reconnect.
                        warn!(error = %e, "closing connection on decode error");
                        break;
                    }
                },
            };

            let response = handler.handle(msg).await;
            if let Err(e) = write_message(&mut writer, &response).await {
                warn!(error = %e, "failed to write response");
                break;
            }
        }
    }
}

/// Resolve the effective socket path: ensure the parent directory exists,
/// falling back to the temp directory, and remove a stale socket file.
fn prepare_socket_path(path: &Path) -> Result<PathBuf, std::io::Error> {
    let effective = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => match std::fs::create_dir_all(dir) {
            Ok(()) => path.to_path_buf(),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "socket dir unavailable, using temp dir");
                let file_name = path.file_name().map(PathBuf::from).unwrap_or_else(|| {
                    PathBuf::from("edge_ai_worker.sock")
                });
                std::env::temp_dir().join(file_name)
            }
        },
        _ => path.to_path_buf(),
    };

    if effective.exists() {
        std::fs::remove_file(&effective)?;
    }
    Ok(effective)
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
