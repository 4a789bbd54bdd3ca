// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in solutions. These exist only in code: they are seeded into the
//! registry at startup, never written to storage, and never deletable.

use std::collections::BTreeMap;

use ea_core::{NodeConfig, SolutionConfig};

fn node(node_type: &str, node_name: &str, parameters: &[(&str, &str)]) -> NodeConfig {
    NodeConfig {
        node_type: node_type.to_string(),
        node_name: node_name.to_string(),
        parameters: parameters
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

fn face_detection() -> SolutionConfig {
    SolutionConfig {
        solution_id: "face_detection".into(),
        solution_name: "Face Detection".into(),
        solution_type: "face_detection".into(),
        is_default: true,
        pipeline: vec![
            node(
                "rtsp_src",
                "rtsp_src_{instanceId}",
                &[("rtsp_url", "${RTSP_URL}"), ("channel", "0"), ("resize_ratio", "0.25")],
            ),
            node(
                "yunet_face_detector",
                "yunet_face_detector_{instanceId}",
                &[("model_path", "${MODEL_PATH}"), ("score_threshold", "${detectionSensitivity}")],
            ),
            node("face_osd_v2", "face_osd_v2_{instanceId}", &[]),
            node(
                "file_des",
                "file_des_{instanceId}",
                &[("file_path", "./output/face_detection_{instanceId}"), ("channel", "0")],
            ),
        ],
        defaults: BTreeMap::new(),
    }
}

fn object_detection() -> SolutionConfig {
    SolutionConfig {
        solution_id: "object_detection".into(),
        solution_name: "Object Detection (YOLO)".into(),
        solution_type: "object_detection".into(),
        is_default: true,
        pipeline: vec![
            node(
                "rtsp_src",
                "rtsp_src_{instanceId}",
                &[("rtsp_url", "${RTSP_URL}"), ("channel", "0"), ("resize_ratio", "0.5")],
            ),
            node(
                "yolo_detector",
                "yolo_detector_{instanceId}",
                &[
                    ("model_path", "${MODEL_PATH}"),
                    ("score_threshold", "${detectionSensitivity}"),
                    ("nms_threshold", "0.4"),
                ],
            ),
            node("osd_v3", "osd_v3_{instanceId}", &[]),
            node(
                "file_des",
                "file_des_{instanceId}",
                &[("file_path", "./output/object_detection_{instanceId}"), ("channel", "0")],
            ),
        ],
        defaults: BTreeMap::new(),
    }
}

fn face_detection_file() -> SolutionConfig {
    SolutionConfig {
        solution_id: "face_detection_file".into(),
        solution_name: "Face Detection (File Source)".into(),
        solution_type: "face_detection".into(),
        is_default: true,
        pipeline: vec![
            node(
                "file_src",
                "file_src_{instanceId}",
                &[("file_path", "${FILE_PATH}"), ("channel", "0"), ("resize_ratio", "0.25")],
            ),
            node(
                "yunet_face_detector",
                "yunet_face_detector_{instanceId}",
                &[("model_path", "${MODEL_PATH}"), ("score_threshold", "${detectionSensitivity}")],
            ),
            node(
                "sface_feature_encoder",
                "sface_feature_encoder_{instanceId}",
                &[("model_path", "${SFACE_MODEL_PATH}")],
            ),
            node(
                "file_des",
                "file_des_{instanceId}",
                &[("file_path", "./output/face_detection_{instanceId}"), ("channel", "0")],
            ),
        ],
        defaults: BTreeMap::new(),
    }
}

fn face_detection_rtmp() -> SolutionConfig {
    SolutionConfig {
        solution_id: "face_detection_rtmp".into(),
        solution_name: "Face Detection (RTMP Streaming)".into(),
        solution_type: "face_detection".into(),
        is_default: true,
        pipeline: vec![
            node(
                "rtsp_src",
                "rtsp_src_{instanceId}",
                &[("rtsp_url", "${RTSP_URL}"), ("channel", "0"), ("resize_ratio", "0.25")],
            ),
            node(
                "yunet_face_detector",
                "yunet_face_detector_{instanceId}",
                &[("model_path", "${MODEL_PATH}"), ("score_threshold", "${detectionSensitivity}")],
            ),
            node("face_osd_v2", "face_osd_v2_{instanceId}", &[]),
            node(
                "rtmp_des",
                "rtmp_des_{instanceId}",
                &[("rtmp_url", "${RTMP_URL}"), ("bitrate", "1024")],
            ),
        ],
        defaults: BTreeMap::new(),
    }
}

/// The fixed, code-defined set of built-in solutions.
pub fn built_in_solutions() -> Vec<SolutionConfig> {
    vec![face_detection(), object_detection(), face_detection_file(), face_detection_rtmp()]
}

#[cfg(test)]
#[path = "defaults_tests.rs"]
mod tests;
