// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance records and runtime statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::request::CreateInstanceRequest;

/// Display names are capped at 255 characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 255;
/// Frame-rate limit is capped at 1000 fps (0 = unlimited).
pub const MAX_FRAME_RATE_LIMIT: i64 = 1000;
/// Input orientation is a quarter-turn count, 0–3.
pub const MAX_INPUT_ORIENTATION: i64 = 3;

/// Detection / movement sensitivity preset.
///
/// The wire boundary carries free strings; this is the typed form used by
/// the builder. Unknown strings parse to `Medium` rather than failing, so a
/// stale config never blocks an instance from loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DetectionSensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl DetectionSensitivity {
    pub fn parse(s: &str) -> Self {
        match s {
            "Low" => DetectionSensitivity::Low,
            "High" => DetectionSensitivity::High,
            _ => DetectionSensitivity::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionSensitivity::Low => "Low",
            DetectionSensitivity::Medium => "Medium",
            DetectionSensitivity::High => "High",
        }
    }

    /// Score threshold the detector runs at for this preset.
    pub fn threshold(&self) -> f64 {
        match self {
            DetectionSensitivity::Low => 0.5,
            DetectionSensitivity::Medium => 0.7,
            DetectionSensitivity::High => 0.9,
        }
    }
}

/// Sensor modality of the input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SensorModality {
    #[default]
    Rgb,
    Thermal,
}

impl SensorModality {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("thermal") {
            SensorModality::Thermal
        } else {
            SensorModality::Rgb
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorModality::Rgb => "RGB",
            SensorModality::Thermal => "Thermal",
        }
    }
}

/// One instance: a running (or loadable) AI pipeline plus its config and
/// identity.
///
/// Invariants: `loaded` implies a registry record exists; `running` implies
/// `loaded`. Lifecycle mutations go through the instance manager, which
/// serializes them per id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceInfo {
    pub instance_id: String,
    pub display_name: String,
    pub group: String,
    pub solution_id: String,
    pub solution_name: String,

    pub persistent: bool,
    pub loaded: bool,
    pub running: bool,
    pub auto_start: bool,
    pub auto_restart: bool,
    pub read_only: bool,
    pub system_instance: bool,

    pub metadata_mode: bool,
    pub statistics_mode: bool,
    pub diagnostics_mode: bool,
    pub debug_mode: bool,

    pub frame_rate_limit: i64,
    pub input_orientation: i64,
    pub input_pixel_limit: i64,

    pub detector_mode: String,
    pub detection_sensitivity: DetectionSensitivity,
    pub movement_sensitivity: DetectionSensitivity,
    pub sensor_modality: SensorModality,

    pub rtsp_url: String,
    pub rtmp_url: String,
    pub file_path: String,
    pub originator_address: String,

    pub additional_params: BTreeMap<String, String>,

    pub fps: f64,
    pub version: String,
    pub retry_count: u32,
    pub retry_limit_reached: bool,
}

impl InstanceInfo {
    /// Build the initial record for a freshly created instance.
    pub fn from_request(instance_id: &str, req: &CreateInstanceRequest) -> Self {
        let mut info = InstanceInfo {
            instance_id: instance_id.to_string(),
            display_name: if req.name.is_empty() { instance_id.to_string() } else { req.name.clone() },
            group: req.group.clone(),
            solution_id: req.solution.clone(),
            persistent: req.persistent,
            loaded: true,
            running: false,
            auto_start: req.auto_start,
            auto_restart: req.auto_restart,
            metadata_mode: req.metadata_mode,
            statistics_mode: req.statistics_mode,
            diagnostics_mode: req.diagnostics_mode,
            debug_mode: req.debug_mode,
            frame_rate_limit: req.frame_rate_limit,
            input_orientation: req.input_orientation,
            input_pixel_limit: req.input_pixel_limit,
            detector_mode: req.detector_mode.clone(),
            detection_sensitivity: DetectionSensitivity::parse(&req.detection_sensitivity),
            movement_sensitivity: DetectionSensitivity::parse(&req.movement_sensitivity),
            sensor_modality: SensorModality::parse(&req.sensor_modality),
            additional_params: req.additional_params.clone(),
            ..Default::default()
        };
        if let Some(url) = req.additional_params.get("RTSP_URL") {
            info.rtsp_url = url.clone();
        }
        if let Some(url) = req.additional_params.get("RTMP_URL") {
            info.rtmp_url = url.clone();
        }
        if let Some(path) = req.additional_params.get("FILE_PATH") {
            info.file_path = path.clone();
        }
        info
    }

    /// Reconstruct the request-shaped config this record was created from.
    ///
    /// Used to respawn a worker from a persisted record and to forward the
    /// full config over IPC.
    pub fn to_request(&self) -> CreateInstanceRequest {
        CreateInstanceRequest {
            name: self.display_name.clone(),
            group: self.group.clone(),
            solution: self.solution_id.clone(),
            persistent: self.persistent,
            frame_rate_limit: self.frame_rate_limit,
            metadata_mode: self.metadata_mode,
            statistics_mode: self.statistics_mode,
            diagnostics_mode: self.diagnostics_mode,
            debug_mode: self.debug_mode,
            detector_mode: self.detector_mode.clone(),
            detection_sensitivity: self.detection_sensitivity.as_str().to_string(),
            movement_sensitivity: self.movement_sensitivity.as_str().to_string(),
            sensor_modality: self.sensor_modality.as_str().to_string(),
            auto_start: self.auto_start,
            auto_restart: self.auto_restart,
            input_orientation: self.input_orientation,
            input_pixel_limit: self.input_pixel_limit,
            additional_params: self.additional_params.clone(),
            ..Default::default()
        }
    }
}

/// Runtime statistics for one instance, as reported by its worker (or read
/// directly from the local pipeline in in-process mode).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceStatistics {
    pub state: String,
    pub frames_processed: u64,
    pub dropped_frames: u64,
    pub current_fps: f64,
    pub queue_size: u64,
    pub uptime_seconds: u64,
    pub resolution: String,
    pub source_resolution: String,
    pub last_error: String,
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
