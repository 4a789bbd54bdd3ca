// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Create and update requests (camelCase wire shape).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::instance::{MAX_DISPLAY_NAME_LEN, MAX_FRAME_RATE_LIMIT, MAX_INPUT_ORIENTATION};
use crate::Error;

fn valid_name_chars(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '_' || c == '-')
}

fn valid_threshold(v: f64) -> bool {
    v.is_finite() && (0.0..=1.0).contains(&v)
}

/// Declarative request to create an instance.
///
/// The additional-parameters map is the solution-specific escape hatch
/// (RTSP_URL, MODEL_PATH, …); it stays stringly typed at this boundary and
/// is converted to typed node config inside the pipeline builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateInstanceRequest {
    pub name: String,
    pub group: String,
    pub solution: String,

    pub persistent: bool,
    pub frame_rate_limit: i64,
    pub metadata_mode: bool,
    pub statistics_mode: bool,
    pub diagnostics_mode: bool,
    pub debug_mode: bool,

    pub detector_mode: String,
    pub detection_sensitivity: String,
    pub movement_sensitivity: String,
    pub sensor_modality: String,

    pub detector_model_file: String,
    pub animal_confidence_threshold: f64,
    pub person_confidence_threshold: f64,
    pub vehicle_confidence_threshold: f64,
    pub face_confidence_threshold: f64,
    pub license_plate_confidence_threshold: f64,
    pub conf_threshold: f64,
    pub detector_thermal_model_file: String,

    pub performance_mode: String,
    pub recommended_frame_rate: i64,

    pub auto_start: bool,
    pub auto_restart: bool,
    pub blocking_readahead_queue: bool,

    pub input_orientation: i64,
    pub input_pixel_limit: i64,

    pub additional_params: BTreeMap<String, String>,
}

impl CreateInstanceRequest {
    /// Validate the request, returning the first violated rule.
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.is_empty() {
            return Err(Error::validation("name is required"));
        }
        if self.name.len() > MAX_DISPLAY_NAME_LEN {
            return Err(Error::validation("name too long (max 255 characters)"));
        }
        if !valid_name_chars(&self.name) {
            return Err(Error::validation(format!("invalid characters in name: {:?}", self.name)));
        }
        if !self.group.is_empty() && !valid_name_chars(&self.group) {
            return Err(Error::validation(format!("invalid characters in group: {:?}", self.group)));
        }
        if !(0..=MAX_FRAME_RATE_LIMIT).contains(&self.frame_rate_limit) {
            return Err(Error::validation("frameRateLimit must be between 0 and 1000"));
        }
        if !(0..=MAX_INPUT_ORIENTATION).contains(&self.input_orientation) {
            return Err(Error::validation("inputOrientation must be between 0 and 3"));
        }
        if self.input_pixel_limit < 0 {
            return Err(Error::validation("inputPixelLimit cannot be negative"));
        }
        for (label, v) in [
            ("animalConfidenceThreshold", self.animal_confidence_threshold),
            ("personConfidenceThreshold", self.person_confidence_threshold),
            ("vehicleConfidenceThreshold", self.vehicle_confidence_threshold),
            ("faceConfidenceThreshold", self.face_confidence_threshold),
            ("licensePlateConfidenceThreshold", self.license_plate_confidence_threshold),
            ("confThreshold", self.conf_threshold),
        ] {
            if !valid_threshold(v) {
                return Err(Error::validation(format!("{label} must be within [0, 1]")));
            }
        }
        Ok(())
    }
}

/// Partial update: only present fields are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateInstanceRequest {
    pub name: Option<String>,
    pub group: Option<String>,
    pub frame_rate_limit: Option<i64>,
    pub metadata_mode: Option<bool>,
    pub statistics_mode: Option<bool>,
    pub diagnostics_mode: Option<bool>,
    pub debug_mode: Option<bool>,
    pub detector_mode: Option<String>,
    pub detection_sensitivity: Option<String>,
    pub movement_sensitivity: Option<String>,
    pub sensor_modality: Option<String>,
    pub auto_start: Option<bool>,
    pub auto_restart: Option<bool>,
    pub input_orientation: Option<i64>,
    pub input_pixel_limit: Option<i64>,
    pub additional_params: Option<BTreeMap<String, String>>,
}

impl UpdateInstanceRequest {
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(name) = &self.name {
            if name.is_empty() || name.len() > MAX_DISPLAY_NAME_LEN || !valid_name_chars(name) {
                return Err(Error::validation(format!("invalid name: {name:?}")));
            }
        }
        if let Some(group) = &self.group {
            if !group.is_empty() && !valid_name_chars(group) {
                return Err(Error::validation(format!("invalid group: {group:?}")));
            }
        }
        if let Some(v) = self.frame_rate_limit {
            if !(0..=MAX_FRAME_RATE_LIMIT).contains(&v) {
                return Err(Error::validation("frameRateLimit must be between 0 and 1000"));
            }
        }
        if let Some(v) = self.input_orientation {
            if !(0..=MAX_INPUT_ORIENTATION).contains(&v) {
                return Err(Error::validation("inputOrientation must be between 0 and 3"));
            }
        }
        if let Some(v) = self.input_pixel_limit {
            if v < 0 {
                return Err(Error::validation("inputPixelLimit cannot be negative"));
            }
        }
        Ok(())
    }

    /// Apply the present fields onto an instance record.
    pub fn apply_to(&self, info: &mut crate::InstanceInfo) {
        if let Some(name) = &self.name {
            info.display_name = name.clone();
        }
        if let Some(group) = &self.group {
            info.group = group.clone();
        }
        if let Some(v) = self.frame_rate_limit {
            info.frame_rate_limit = v;
        }
        if let Some(v) = self.metadata_mode {
            info.metadata_mode = v;
        }
        if let Some(v) = self.statistics_mode {
            info.statistics_mode = v;
        }
        if let Some(v) = self.diagnostics_mode {
            info.diagnostics_mode = v;
        }
        if let Some(v) = self.debug_mode {
            info.debug_mode = v;
        }
        if let Some(v) = &self.detector_mode {
            info.detector_mode = v.clone();
        }
        if let Some(v) = &self.detection_sensitivity {
            info.detection_sensitivity = crate::DetectionSensitivity::parse(v);
        }
        if let Some(v) = &self.movement_sensitivity {
            info.movement_sensitivity = crate::DetectionSensitivity::parse(v);
        }
        if let Some(v) = &self.sensor_modality {
            info.sensor_modality = crate::SensorModality::parse(v);
        }
        if let Some(v) = self.auto_start {
            info.auto_start = v;
        }
        if let Some(v) = self.auto_restart {
            info.auto_restart = v;
        }
        if let Some(v) = self.input_orientation {
            info.input_orientation = v;
        }
        if let Some(v) = self.input_pixel_limit {
            info.input_pixel_limit = v;
        }
        if let Some(params) = &self.additional_params {
            for (k, v) in params {
                info.additional_params.insert(k.clone(), v.clone());
            }
        }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
