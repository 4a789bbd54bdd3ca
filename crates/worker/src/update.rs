// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hot-config change planning.
//!
//! A config delta either requires a full pipeline rebuild (source, solution,
//! or topology changed) or can be applied in place by mutating node
//! parameters. Configs here are the request-shaped camelCase JSON the worker
//! was spawned with.

use serde_json::Value;

use ea_core::DetectionSensitivity;

/// What a config change requires.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdatePlan {
    /// Nothing the pipeline cares about changed.
    NoChange,
    /// Apply these (key, value) node-parameter mutations in place.
    InPlace(Vec<(String, String)>),
    /// Source, solution, or topology changed: pre-build and hot-swap.
    Rebuild,
}

fn additional_param<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    config.get("additionalParams").and_then(|p| p.get(key)).and_then(Value::as_str)
}

fn str_field<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}

/// Decide how to apply a config change.
///
/// The new config may be partial: a field it does not mention is
/// unchanged, never a reason to rebuild.
pub fn plan_update(old: &Value, new: &Value) -> UpdatePlan {
    // Source or solution changes invalidate the node graph.
    if let Some(solution) = str_field(new, "solution") {
        if str_field(old, "solution") != Some(solution) {
            return UpdatePlan::Rebuild;
        }
    }
    for source_key in ["RTSP_URL", "FILE_PATH", "RTMP_URL"] {
        if let Some(url) = additional_param(new, source_key) {
            if additional_param(old, source_key) != Some(url) {
                return UpdatePlan::Rebuild;
            }
        }
    }
    // An explicit pipeline override is a topology change.
    if let Some(pipeline) = new.get("pipeline") {
        if old.get("pipeline") != Some(pipeline) {
            return UpdatePlan::Rebuild;
        }
    }

    let mut deltas = Vec::new();

    let old_sensitivity = str_field(old, "detectionSensitivity");
    let new_sensitivity = str_field(new, "detectionSensitivity");
    if let Some(sensitivity) = new_sensitivity.filter(|_| new_sensitivity != old_sensitivity) {
        let threshold = DetectionSensitivity::parse(sensitivity).threshold();
        deltas.push(("score_threshold".to_string(), threshold.to_string()));
    }

    let old_rate = old.get("frameRateLimit").and_then(Value::as_i64);
    let new_rate = new.get("frameRateLimit").and_then(Value::as_i64);
    if let Some(rate) = new_rate.filter(|_| new_rate != old_rate) {
        deltas.push(("frame_rate_limit".to_string(), rate.to_string()));
    }

    for osd_key in ["SHOW_LABELS", "OSD_ENABLED"] {
        let old_value = additional_param(old, osd_key);
        let new_value = additional_param(new, osd_key);
        if let Some(value) = new_value.filter(|_| new_value != old_value) {
            deltas.push((osd_key.to_ascii_lowercase(), value.to_string()));
        }
    }

    if deltas.is_empty() {
        UpdatePlan::NoChange
    } else {
        UpdatePlan::InPlace(deltas)
    }
}

#[cfg(test)]
#[path = "update_tests.rs"]
mod tests;
