// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;

use serial_test::serial;

use ea_core::{CreateInstanceRequest, NodeConfig, SolutionConfig};

use super::*;

const ID: &str = "550e8400-e29b-41d4-a716-446655440000";

fn node(node_type: &str, params: &[(&str, &str)]) -> NodeConfig {
    NodeConfig {
        node_type: node_type.into(),
        node_name: format!("{node_type}_{{instanceId}}"),
        parameters: params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
    }
}

fn face_solution() -> SolutionConfig {
    SolutionConfig {
        solution_id: "face_detection".into(),
        solution_name: "Face Detection".into(),
        solution_type: "face_detection".into(),
        is_default: true,
        pipeline: vec![
            node("rtsp_src", &[("rtsp_url", "${RTSP_URL}"), ("resize_ratio", "0.25")]),
            node(
                "yunet_face_detector",
                &[("model_path", "${MODEL_PATH}"), ("score_threshold", "${detectionSensitivity}")],
            ),
            node("face_osd_v2", &[]),
            node("file_des", &[("file_path", "./output/{instanceId}")]),
        ],
        defaults: BTreeMap::new(),
    }
}

fn request_with(params: &[(&str, &str)]) -> CreateInstanceRequest {
    CreateInstanceRequest {
        name: "A".into(),
        solution: "face_detection".into(),
        additional_params: params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        ..Default::default()
    }
}

#[test]
#[serial]
fn builds_attached_chain_in_template_order() {
    std::env::set_var("OSD_DEFAULT_FONT_PATH", "");
    let req = request_with(&[("RTSP_URL", "rtsp://x/y")]);
    let pipeline = build_pipeline(&face_solution(), &req, ID).unwrap();
    std::env::remove_var("OSD_DEFAULT_FONT_PATH");

    assert_eq!(pipeline.len(), 4);
    assert_eq!(
        pipeline.node_names(),
        vec![
            format!("rtsp_src_{ID}"),
            format!("yunet_face_detector_{ID}"),
            format!("face_osd_v2_{ID}"),
            format!("file_des_{ID}"),
        ]
    );
    let attachments: Vec<Option<&str>> = pipeline.nodes().map(|n| n.attached_to()).collect();
    assert_eq!(attachments[0], None);
    assert_eq!(attachments[1], Some(format!("rtsp_src_{ID}").as_str()));
    assert_eq!(attachments[3], Some(format!("face_osd_v2_{ID}").as_str()));
}

#[test]
#[serial]
fn unknown_node_type_fails() {
    let solution = SolutionConfig {
        pipeline: vec![node("quantum_detector", &[])],
        ..face_solution()
    };
    let err = build_pipeline(&solution, &request_with(&[]), ID).unwrap_err();
    assert!(matches!(err, BuildError::UnknownNodeType(t) if t == "quantum_detector"));
}

#[test]
#[serial]
fn empty_pipeline_fails() {
    let solution = SolutionConfig { pipeline: vec![], ..face_solution() };
    assert!(matches!(
        build_pipeline(&solution, &request_with(&[]), ID),
        Err(BuildError::InvalidParam(_))
    ));
}

#[test]
#[serial]
fn sensitivity_maps_to_score_threshold() {
    std::env::set_var("OSD_DEFAULT_FONT_PATH", "");
    for (sensitivity, expected) in [("Low", 0.5), ("Medium", 0.7), ("High", 0.9), ("Bogus", 0.7)] {
        let mut req = request_with(&[("RTSP_URL", "rtsp://x/y")]);
        req.detection_sensitivity = sensitivity.into();
        let pipeline = build_pipeline(&face_solution(), &req, ID).unwrap();
        assert_eq!(
            pipeline.get_param("score_threshold"),
            Some(expected.to_string()),
            "sensitivity {sensitivity}"
        );
    }
    std::env::remove_var("OSD_DEFAULT_FONT_PATH");
}

#[test]
#[serial]
fn explicit_model_path_used_when_file_exists() {
    let dir = tempfile::tempdir().unwrap();
    let face_dir = dir.path().join("models/face");
    std::fs::create_dir_all(&face_dir).unwrap();
    let model = face_dir.join("yunet.onnx");
    std::fs::write(&model, b"model").unwrap();

    std::env::set_var("OSD_DEFAULT_FONT_PATH", "");
    let req = request_with(&[
        ("RTSP_URL", "rtsp://x/y"),
        ("MODEL_PATH", model.to_str().unwrap()),
    ]);
    let pipeline = build_pipeline(&face_solution(), &req, ID).unwrap();
    std::env::remove_var("OSD_DEFAULT_FONT_PATH");
    assert_eq!(pipeline.get_param("model_path"), Some(model.display().to_string()));
}

#[test]
#[serial]
fn missing_explicit_yunet_selects_dated_alternative() {
    let dir = tempfile::tempdir().unwrap();
    let face_dir = dir.path().join("models/face");
    std::fs::create_dir_all(&face_dir).unwrap();
    let alternative = face_dir.join("face_detection_yunet_2023mar.onnx");
    std::fs::write(&alternative, b"model").unwrap();

    let missing = face_dir.join("yunet.onnx");
    let req = request_with(&[("MODEL_PATH", missing.to_str().unwrap())]);

    // Resolve through the same path the detector constructor takes.
    let solution = SolutionConfig {
        pipeline: vec![node(
            "yunet_face_detector",
            &[("model_path", "${MODEL_PATH}")],
        )],
        ..face_solution()
    };
    let pipeline = build_pipeline(&solution, &req, ID).unwrap();
    assert_eq!(
        pipeline.get_param("model_path"),
        Some(alternative.display().to_string()),
        "detector constructed with the dated alternative"
    );
}

#[test]
#[serial]
fn nan_parameter_fails_construction() {
    let solution = SolutionConfig {
        pipeline: vec![node("rtsp_src", &[("rtsp_url", "rtsp://x/y"), ("resize_ratio", "NaN")])],
        ..face_solution()
    };
    assert!(matches!(
        build_pipeline(&solution, &request_with(&[]), ID),
        Err(BuildError::InvalidParam(_))
    ));
}

#[test]
#[serial]
fn rtmp_destination_without_url_fails() {
    let solution = SolutionConfig {
        pipeline: vec![
            node("rtsp_src", &[("rtsp_url", "rtsp://x/y")]),
            node("rtmp_des", &[("rtmp_url", "${RTMP_URL}")]),
        ],
        ..face_solution()
    };
    let err = build_pipeline(&solution, &request_with(&[]), ID).unwrap_err();
    assert!(matches!(err, BuildError::InvalidParam(_)), "{err:?}");
}

#[test]
#[serial]
fn generic_placeholder_resolves_from_request_params() {
    std::env::set_var("OSD_DEFAULT_FONT_PATH", "");
    let solution = SolutionConfig {
        pipeline: vec![node("rtsp_src", &[("rtsp_url", "${CUSTOM_SOURCE}")])],
        ..face_solution()
    };
    let req = request_with(&[("CUSTOM_SOURCE", "rtsp://custom/1")]);
    let pipeline = build_pipeline(&solution, &req, ID).unwrap();
    std::env::remove_var("OSD_DEFAULT_FONT_PATH");
    assert_eq!(pipeline.len(), 1);
}

#[test]
#[serial]
fn bootstrap_defaults_rtsp_transport_to_tcp() {
    // bootstrap() runs once per process; other tests may already have
    // triggered it through build_pipeline, so only the outcome is checked.
    std::env::remove_var("GST_RTSP_PROTOCOLS");
    bootstrap();
    let configured = std::env::var("GST_RTSP_PROTOCOLS").ok();
    assert!(configured.is_none() || configured.as_deref() == Some("tcp"));
}
