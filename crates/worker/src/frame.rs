// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Last-frame cache and FPS accounting.
//!
//! Frames are shared immutable buffers: readers clone the `Arc`, writers
//! swap the pointer under a short lock. No frame data is ever deep-copied.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// One captured frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Shared cache of the most recent frame.
pub struct FrameCache {
    latest: Mutex<Option<(Arc<FrameData>, Instant)>>,
}

impl FrameCache {
    pub fn new() -> Self {
        FrameCache { latest: Mutex::new(None) }
    }

    /// Swap in a new frame.
    pub fn update(&self, frame: Arc<FrameData>) {
        *self.latest.lock() = Some((frame, Instant::now()));
    }

    /// The latest frame and its age, if any frame has been captured.
    pub fn latest(&self) -> Option<(Arc<FrameData>, Duration)> {
        self.latest.lock().as_ref().map(|(frame, at)| (Arc::clone(frame), at.elapsed()))
    }
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Rolling one-second FPS window.
pub struct FpsWindow {
    inner: Mutex<FpsState>,
}

struct FpsState {
    window_start: Instant,
    frames_in_window: u32,
    current_fps: f64,
}

impl FpsWindow {
    pub fn new() -> Self {
        FpsWindow {
            inner: Mutex::new(FpsState {
                window_start: Instant::now(),
                frames_in_window: 0,
                current_fps: 0.0,
            }),
        }
    }

    /// Record one processed frame.
    pub fn record(&self) {
        let mut state = self.inner.lock();
        state.frames_in_window += 1;
        let elapsed = state.window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            state.current_fps = f64::from(state.frames_in_window) / elapsed.as_secs_f64();
            state.frames_in_window = 0;
            state.window_start = Instant::now();
        }
    }

    /// FPS computed over the last completed window.
    pub fn fps(&self) -> f64 {
        self.inner.lock().current_fps
    }
}

impl Default for FpsWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
