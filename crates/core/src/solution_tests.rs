// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;

use super::*;

#[test]
fn node_name_substitution_replaces_every_occurrence() {
    assert_eq!(
        SolutionConfig::node_name("rtsp_src_{instanceId}_{instanceId}", "abc"),
        "rtsp_src_abc_abc"
    );
}

#[test]
fn substitute_resolves_request_references() {
    let mut params = BTreeMap::new();
    params.insert("RTSP_URL".to_string(), "rtsp://cam/1".to_string());
    assert_eq!(substitute("${RTSP_URL}", &params, "id"), "rtsp://cam/1");
    assert_eq!(substitute("prefix-${RTSP_URL}-{instanceId}", &params, "id"), "prefix-rtsp://cam/1-id");
}

#[test]
fn unresolved_reference_becomes_empty() {
    let params = BTreeMap::new();
    assert_eq!(substitute("${MISSING}", &params, "id"), "");
}

#[test]
fn resolve_parameter_falls_through_defaults_then_request() {
    let mut solution = SolutionConfig::default();
    solution.defaults.insert("threshold".into(), "0.7".into());
    let mut req = BTreeMap::new();
    req.insert("bitrate".to_string(), "4000".to_string());

    assert_eq!(solution.resolve_parameter("threshold", &req, "id"), "0.7");
    assert_eq!(solution.resolve_parameter("bitrate", &req, "id"), "4000");
    assert_eq!(solution.resolve_parameter("missing", &req, "id"), "");
}

#[test]
fn serde_shape_is_camel_case() {
    let json = r#"{
        "solutionId": "custom",
        "solutionName": "Custom",
        "solutionType": "face_detection",
        "isDefault": true,
        "pipeline": [{"nodeType": "rtsp_src", "nodeName": "src_{instanceId}", "parameters": {}}]
    }"#;
    let solution: SolutionConfig = serde_json::from_str(json).unwrap();
    assert!(solution.is_default);
    assert_eq!(solution.pipeline[0].node_type, "rtsp_src");
}
