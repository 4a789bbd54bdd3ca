// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config file watcher: kernel notify where available, polling fallback.
//!
//! Edits are coalesced: after any change event the watcher waits for the
//! stability window and re-samples the modification time, firing the
//! callback only once the file has stopped moving.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Quiet period a changed file must hold before the callback fires.
const STABILITY_CHECK: Duration = Duration::from_millis(100);

/// Poll cadence when the kernel watcher is unavailable.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Callback invoked with the path once a change has settled.
pub type ChangeCallback = Box<dyn Fn(&Path) + Send + Sync>;

pub struct ConfigFileWatcher {
    path: PathBuf,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ConfigFileWatcher {
    pub fn new(path: &Path) -> Self {
        ConfigFileWatcher {
            path: path.to_path_buf(),
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Start watching. Idempotent per watcher instance.
    pub fn start(&mut self, callback: ChangeCallback) {
        if self.task.is_some() {
            return;
        }
        let path = self.path.clone();
        let cancel = self.cancel.clone();
        self.task = Some(tokio::spawn(watch_loop(path, callback, cancel)));
    }

    /// Stop watching and join the task.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Wait for the file to stop changing, then fire the callback once.
async fn settle_and_fire(path: &Path, callback: &ChangeCallback) {
    loop {
        let before = mtime(path);
        tokio::time::sleep(STABILITY_CHECK).await;
        if mtime(path) == before {
            break;
        }
    }
    if path.exists() {
        info!(path = %path.display(), "config file changed, applying");
        callback(path);
    }
}

async fn watch_loop(path: PathBuf, callback: ChangeCallback, cancel: CancellationToken) {
    let watch_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let file_name = path.file_name().map(|n| n.to_os_string());

    // Kernel notify first; its events arrive on the backend's own thread and
    // are bridged over an unbounded channel.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Event>();
    let watcher = notify::recommended_watcher(move |result: Result<notify::Event, notify::Error>| {
        if let Ok(event) = result {
            let _ = event_tx.send(event);
        }
    })
    .and_then(|mut w| w.watch(&watch_dir, RecursiveMode::NonRecursive).map(|()| w));

    match watcher {
        Ok(_watcher) => {
            debug!(path = %path.display(), "watching config file via kernel notify");
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = event_rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                let ours = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                if ours && (event.kind.is_modify() || event.kind.is_create()) {
                    settle_and_fire(&path, &callback).await;
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "kernel watcher unavailable, falling back to polling");
            let mut last = mtime(&path);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(POLL_INTERVAL) => {}
                }
                let current = mtime(&path);
                if current != last {
                    last = current;
                    settle_and_fire(&path, &callback).await;
                    last = mtime(&path);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
