// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use super::*;

fn base() -> serde_json::Value {
    json!({
        "name": "A",
        "solution": "face_detection",
        "detectionSensitivity": "Medium",
        "frameRateLimit": 10,
        "additionalParams": {"RTSP_URL": "rtsp://x/y"}
    })
}

#[test]
fn identical_config_is_no_change() {
    assert_eq!(plan_update(&base(), &base()), UpdatePlan::NoChange);
}

#[test]
fn sensitivity_change_applies_in_place() {
    let mut new = base();
    new["detectionSensitivity"] = json!("High");
    match plan_update(&base(), &new) {
        UpdatePlan::InPlace(deltas) => {
            assert_eq!(deltas, vec![("score_threshold".to_string(), "0.9".to_string())]);
        }
        other => panic!("expected in-place plan, got {other:?}"),
    }
}

#[test]
fn frame_rate_change_applies_in_place() {
    let mut new = base();
    new["frameRateLimit"] = json!(25);
    match plan_update(&base(), &new) {
        UpdatePlan::InPlace(deltas) => {
            assert_eq!(deltas, vec![("frame_rate_limit".to_string(), "25".to_string())]);
        }
        other => panic!("expected in-place plan, got {other:?}"),
    }
}

#[test]
fn source_url_change_requires_rebuild() {
    let mut new = base();
    new["additionalParams"]["RTSP_URL"] = json!("rtsp://other/stream");
    assert_eq!(plan_update(&base(), &new), UpdatePlan::Rebuild);
}

#[test]
fn solution_change_requires_rebuild() {
    let mut new = base();
    new["solution"] = json!("object_detection");
    assert_eq!(plan_update(&base(), &new), UpdatePlan::Rebuild);
}

#[test]
fn unrelated_fields_are_no_change() {
    let mut new = base();
    new["persistent"] = json!(true);
    new["name"] = json!("renamed");
    assert_eq!(plan_update(&base(), &new), UpdatePlan::NoChange);
}
