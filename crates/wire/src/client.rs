// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix socket client held by the supervisor, one per worker.
//!
//! The send and receive paths are guarded by separate async mutexes so that
//! concurrent supervisor callers serialize correctly while a
//! `send_and_receive` in flight never deadlocks against a push from the
//! worker side.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::debug;

use crate::frame::{read_message, write_message, FrameError};
use crate::message::IpcMessage;

/// Client transport errors. A receive timeout is not an error: it yields an
/// ERROR_RESPONSE message with status TIMEOUT (see [`IpcMessage::timeout`]),
/// because the worker may still complete the request.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not connected")]
    NotConnected,

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct WorkerClient {
    socket_path: PathBuf,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    connected: AtomicBool,
}

impl WorkerClient {
    pub fn new(socket_path: &Path) -> Self {
        WorkerClient {
            socket_path: socket_path.to_path_buf(),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub async fn connect(&self, timeout: Duration) -> Result<(), ClientError> {
        let stream = tokio::time::timeout(timeout, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| ClientError::ConnectTimeout(timeout))??;
        let (r, w) = stream.into_split();
        *self.reader.lock().await = Some(r);
        *self.writer.lock().await = Some(w);
        self.connected.store(true, Ordering::Release);
        debug!(socket = %self.socket_path.display(), "connected to worker");
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.reader.lock().await.take();
        self.writer.lock().await.take();
        self.connected.store(false, Ordering::Release);
    }

    /// Send one message without waiting for a response.
    pub async fn send(&self, msg: &IpcMessage) -> Result<(), ClientError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ClientError::NotConnected)?;
        match write_message(writer, msg).await {
            Ok(()) => Ok(()),
            Err(FrameError::Io(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                self.connected.store(false, Ordering::Release);
                Err(ClientError::Io(e))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Receive one message, synthesizing a TIMEOUT error response on expiry.
    pub async fn receive(&self, timeout: Duration) -> Result<IpcMessage, ClientError> {
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(ClientError::NotConnected)?;
        match tokio::time::timeout(timeout, read_message(reader)).await {
            Ok(Ok(msg)) => Ok(msg),
            Ok(Err(FrameError::ConnectionClosed)) => {
                self.connected.store(false, Ordering::Release);
                Err(FrameError::ConnectionClosed.into())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(IpcMessage::timeout()),
        }
    }

    /// Blocking request/response with a per-operation timeout.
    ///
    /// The receive path is claimed before the send path is released, so two
    /// concurrent exchanges cannot cross each other's replies: the second
    /// sender writes only after the first, and reads only after the first
    /// reader is done.
    pub async fn send_and_receive(
        &self,
        msg: &IpcMessage,
        timeout: Duration,
    ) -> Result<IpcMessage, ClientError> {
        let mut write_guard = self.writer.lock().await;
        let writer = write_guard.as_mut().ok_or(ClientError::NotConnected)?;
        match write_message(writer, msg).await {
            Ok(()) => {}
            Err(FrameError::Io(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                self.connected.store(false, Ordering::Release);
                return Err(ClientError::Io(e));
            }
            Err(e) => return Err(e.into()),
        }

        let mut read_guard = self.reader.lock().await;
        drop(write_guard);
        let reader = read_guard.as_mut().ok_or(ClientError::NotConnected)?;
        match tokio::time::timeout(timeout, read_message(reader)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(FrameError::ConnectionClosed)) => {
                self.connected.store(false, Ordering::Release);
                Err(FrameError::ConnectionClosed.into())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(IpcMessage::timeout()),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
