// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Translation between instance records and the persisted PascalCase
//! config schema.
//!
//! The on-disk shape groups settings into nested sections (`Input`,
//! `SolutionManager`, `Detector`, `Movement`, `Output`, `AdditionalParams`)
//! and wraps RTSP sources in a gstreamer URI, matching what the pipeline
//! runtime consumes directly.

use serde_json::{json, Map, Value};

use ea_core::{
    DetectionSensitivity, InstanceInfo, SensorModality, MAX_DISPLAY_NAME_LEN,
    MAX_FRAME_RATE_LIMIT, MAX_INPUT_ORIENTATION,
};

use crate::StorageError;

/// Validate the semantic record before it is written or after it is read.
pub fn validate_instance(info: &InstanceInfo) -> Result<(), StorageError> {
    if info.instance_id.is_empty() {
        return Err(StorageError::InvalidRecord("InstanceId cannot be empty".into()));
    }
    if info.instance_id.len() < 10 {
        return Err(StorageError::InvalidRecord("InstanceId format appears invalid".into()));
    }
    if info.display_name.len() > MAX_DISPLAY_NAME_LEN {
        return Err(StorageError::InvalidRecord("DisplayName too long (max 255 characters)".into()));
    }
    if !(0..=MAX_FRAME_RATE_LIMIT).contains(&info.frame_rate_limit) {
        return Err(StorageError::InvalidRecord("frameRateLimit must be between 0 and 1000".into()));
    }
    if !(0..=MAX_INPUT_ORIENTATION).contains(&info.input_orientation) {
        return Err(StorageError::InvalidRecord("inputOrientation must be between 0 and 3".into()));
    }
    if info.input_pixel_limit < 0 {
        return Err(StorageError::InvalidRecord("inputPixelLimit cannot be negative".into()));
    }
    Ok(())
}

/// Validate the raw persisted shape: must be an object with a string
/// `InstanceId` and object-typed nested sections where present.
pub fn validate_config(config: &Value) -> Result<(), StorageError> {
    let obj = config
        .as_object()
        .ok_or_else(|| StorageError::InvalidRecord("config must be a JSON object".into()))?;
    match obj.get("InstanceId") {
        Some(Value::String(id)) if !id.is_empty() => {}
        _ => {
            return Err(StorageError::InvalidRecord(
                "config must contain 'InstanceId' as a non-empty string".into(),
            ))
        }
    }
    for key in ["Input", "SolutionManager", "Detector"] {
        if let Some(section) = obj.get(key) {
            if !section.is_object() {
                return Err(StorageError::InvalidRecord(format!("{key} must be a JSON object")));
            }
        }
    }
    Ok(())
}

/// Wrap an RTSP url in the gstreamer source URI the runtime consumes.
fn gstreamer_uri(rtsp_url: &str) -> String {
    format!(
        "gstreamer:///urisourcebin uri={rtsp_url} ! decodebin ! videoconvert \
         ! video/x-raw, format=NV12 ! appsink drop=true name=cvdsink"
    )
}

/// Extract the RTSP url back out of a gstreamer source URI.
fn rtsp_from_uri(uri: &str) -> Option<String> {
    let start = uri.find("uri=")? + 4;
    let rest = &uri[start..];
    let end = rest.find(" !").unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

/// Convert a semantic record into the persisted config shape.
pub fn instance_to_config(info: &InstanceInfo) -> Result<Value, StorageError> {
    validate_instance(info)?;

    let mut config = Map::new();
    config.insert("InstanceId".into(), json!(info.instance_id));
    if !info.display_name.is_empty() {
        config.insert("DisplayName".into(), json!(info.display_name));
    }
    if !info.solution_id.is_empty() {
        config.insert("Solution".into(), json!(info.solution_id));
    }
    if !info.solution_name.is_empty() {
        config.insert("SolutionName".into(), json!(info.solution_name));
    }
    if !info.group.is_empty() {
        config.insert("Group".into(), json!(info.group));
    }
    config.insert("ReadOnly".into(), json!(info.read_only));
    config.insert("SystemInstance".into(), json!(info.system_instance));
    config.insert("AutoStart".into(), json!(info.auto_start));
    config.insert("AutoRestart".into(), json!(info.auto_restart));

    let mut input = Map::new();
    if info.input_pixel_limit > 0 {
        input.insert("media_format".into(), json!({"input_pixel_limit": info.input_pixel_limit}));
    }
    if info.input_orientation > 0 {
        input.insert("inputOrientation".into(), json!(info.input_orientation));
    }
    if !info.rtsp_url.is_empty() {
        input.insert("media_type".into(), json!("IP Camera"));
        input.insert("uri".into(), json!(gstreamer_uri(&info.rtsp_url)));
    } else if !info.file_path.is_empty() {
        input.insert("media_type".into(), json!("File"));
        input.insert("uri".into(), json!(info.file_path));
    }
    if !input.is_empty() {
        config.insert("Input".into(), Value::Object(input));
    }

    if !info.rtmp_url.is_empty() {
        config.insert("Output".into(), json!({"handlers": {}, "rtmpUrl": info.rtmp_url}));
    }

    if !info.originator_address.is_empty() {
        config.insert("OriginatorInfo".into(), json!({"address": info.originator_address}));
    }

    let mut solution_manager = Map::new();
    solution_manager.insert("frame_rate_limit".into(), json!(info.frame_rate_limit));
    solution_manager.insert("send_metadata".into(), json!(info.metadata_mode));
    solution_manager.insert("run_statistics".into(), json!(info.statistics_mode));
    solution_manager.insert("send_diagnostics".into(), json!(info.diagnostics_mode));
    solution_manager.insert("enable_debug".into(), json!(info.debug_mode));
    if info.input_pixel_limit > 0 {
        solution_manager.insert("input_pixel_limit".into(), json!(info.input_pixel_limit));
    }
    config.insert("SolutionManager".into(), Value::Object(solution_manager));

    let mut detector = Map::new();
    if !info.detector_mode.is_empty() {
        detector.insert("current_preset".into(), json!(info.detector_mode));
    }
    detector.insert(
        "current_sensitivity_preset".into(),
        json!(info.detection_sensitivity.as_str()),
    );
    config.insert("Detector".into(), Value::Object(detector));

    config.insert(
        "Movement".into(),
        json!({"current_sensitivity_preset": info.movement_sensitivity.as_str()}),
    );

    if !info.additional_params.is_empty() {
        let params: Map<String, Value> = info
            .additional_params
            .iter()
            .map(|(k, v)| (k.clone(), json!(v)))
            .collect();
        config.insert("AdditionalParams".into(), Value::Object(params));
    }

    config.insert("loaded".into(), json!(info.loaded));
    config.insert("running".into(), json!(info.running));
    config.insert("fps".into(), json!(info.fps));
    config.insert("version".into(), json!(info.version));

    let config = Value::Object(config);
    validate_config(&config)?;
    Ok(config)
}

fn str_of<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn bool_of(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    obj.get(key).and_then(Value::as_bool)
}

/// Convert a persisted config back into the semantic record.
pub fn config_to_instance(config: &Value) -> Result<InstanceInfo, StorageError> {
    validate_config(config)?;
    let obj = config
        .as_object()
        .ok_or_else(|| StorageError::InvalidRecord("config must be a JSON object".into()))?;

    let mut info = InstanceInfo {
        instance_id: str_of(obj, "InstanceId").unwrap_or_default().to_string(),
        display_name: str_of(obj, "DisplayName").unwrap_or_default().to_string(),
        solution_id: str_of(obj, "Solution").unwrap_or_default().to_string(),
        solution_name: str_of(obj, "SolutionName").unwrap_or_default().to_string(),
        group: str_of(obj, "Group").unwrap_or_default().to_string(),
        read_only: bool_of(obj, "ReadOnly").unwrap_or(false),
        system_instance: bool_of(obj, "SystemInstance").unwrap_or(false),
        auto_start: bool_of(obj, "AutoStart").unwrap_or(false),
        auto_restart: bool_of(obj, "AutoRestart").unwrap_or(false),
        fps: obj.get("fps").and_then(Value::as_f64).unwrap_or(0.0),
        version: str_of(obj, "version").unwrap_or_default().to_string(),
        ..Default::default()
    };

    if let Some(input) = obj.get("Input").and_then(Value::as_object) {
        if let Some(uri) = str_of(input, "uri") {
            if let Some(rtsp) = rtsp_from_uri(uri) {
                info.rtsp_url = rtsp;
            } else {
                info.file_path = uri.to_string();
            }
        }
        if let Some(orientation) = input.get("inputOrientation").and_then(Value::as_i64) {
            info.input_orientation = orientation;
        }
        if let Some(limit) = input
            .get("media_format")
            .and_then(Value::as_object)
            .and_then(|f| f.get("input_pixel_limit"))
            .and_then(Value::as_i64)
        {
            info.input_pixel_limit = limit;
        }
    }

    if let Some(output) = obj.get("Output").and_then(Value::as_object) {
        if let Some(rtmp) = str_of(output, "rtmpUrl") {
            info.rtmp_url = rtmp.to_string();
        }
    }

    if let Some(originator) = obj.get("OriginatorInfo").and_then(Value::as_object) {
        if let Some(address) = str_of(originator, "address") {
            info.originator_address = address.to_string();
        }
    }

    if let Some(sm) = obj.get("SolutionManager").and_then(Value::as_object) {
        if let Some(v) = sm.get("frame_rate_limit").and_then(Value::as_i64) {
            info.frame_rate_limit = v;
        }
        if let Some(v) = bool_of(sm, "send_metadata") {
            info.metadata_mode = v;
        }
        if let Some(v) = bool_of(sm, "run_statistics") {
            info.statistics_mode = v;
        }
        if let Some(v) = bool_of(sm, "send_diagnostics") {
            info.diagnostics_mode = v;
        }
        if let Some(v) = bool_of(sm, "enable_debug") {
            info.debug_mode = v;
        }
        if let Some(v) = sm.get("input_pixel_limit").and_then(Value::as_i64) {
            info.input_pixel_limit = v;
        }
    }

    if let Some(detector) = obj.get("Detector").and_then(Value::as_object) {
        if let Some(v) = str_of(detector, "current_preset") {
            info.detector_mode = v.to_string();
        }
        if let Some(v) = str_of(detector, "current_sensitivity_preset") {
            info.detection_sensitivity = DetectionSensitivity::parse(v);
        }
    }

    if let Some(movement) = obj.get("Movement").and_then(Value::as_object) {
        if let Some(v) = str_of(movement, "current_sensitivity_preset") {
            info.movement_sensitivity = DetectionSensitivity::parse(v);
        }
    }

    if let Some(params) = obj.get("AdditionalParams").and_then(Value::as_object) {
        for (key, value) in params {
            if let Some(s) = value.as_str() {
                info.additional_params.insert(key.clone(), s.to_string());
                if key == "RTSP_URL" && info.rtsp_url.is_empty() {
                    info.rtsp_url = s.to_string();
                }
                if key == "FILE_PATH" && info.file_path.is_empty() {
                    info.file_path = s.to_string();
                }
                if key == "SENSOR_MODALITY" {
                    info.sensor_modality = SensorModality::parse(s);
                }
            }
        }
    }

    // Everything in instances.json is a persistent, loadable record; running
    // is decided at start time, never restored from disk.
    info.persistent = true;
    info.loaded = true;
    info.running = false;

    validate_instance(&info)?;
    Ok(info)
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
