// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serial_test::serial;

use super::*;

fn chain() -> Pipeline {
    let source = SourceNode::new("src", NodeKind::RtspSource, "rtsp://x/y").unwrap();
    let detector = InferenceNode::new(
        "det",
        NodeKind::YunetFaceDetector,
        PathBuf::from("/models/yunet.onnx"),
    )
    .unwrap();
    let mut detector: Box<dyn PipelineNode> = Box::new(detector);
    detector.attach_to("src");
    Pipeline::from_nodes(vec![Box::new(source), detector])
}

#[test]
fn tags_round_trip() {
    for tag in [
        "rtsp_src",
        "file_src",
        "app_src",
        "rtmp_src",
        "ffmpeg_src",
        "yunet_face_detector",
        "yolo_detector",
        "sface_feature_encoder",
        "face_osd_v2",
        "osd_v3",
        "file_des",
        "rtmp_des",
        "app_des",
    ] {
        assert_eq!(NodeKind::from_tag(tag).map(|k| k.tag()), Some(tag));
    }
    assert!(NodeKind::from_tag("quantum_detector").is_none());
}

#[test]
fn empty_source_uri_rejected() {
    assert!(SourceNode::new("src", NodeKind::RtspSource, "").is_err());
    assert!(SourceNode::new("", NodeKind::RtspSource, "rtsp://x").is_err());
}

#[test]
fn rtmp_destination_requires_url() {
    assert!(DestinationNode::new("sink", NodeKind::RtmpDestination, "").is_err());
    assert!(DestinationNode::new("sink", NodeKind::FileDestination, "").is_ok());
}

#[test]
fn start_drives_source_and_stop_detaches_in_reverse() {
    let mut pipeline = chain();
    assert!(!pipeline.is_running());
    pipeline.start().unwrap();
    assert!(pipeline.is_running());
    let running: Vec<bool> = pipeline.nodes().map(|n| n.is_running()).collect();
    assert_eq!(running, vec![true, false], "only the source starts directly");

    pipeline.stop();
    assert!(!pipeline.is_running());
    assert!(pipeline.nodes().all(|n| !n.is_running()));
    assert!(pipeline.nodes().all(|n| n.attached_to().is_none()));
}

#[test]
fn set_param_routes_to_recognizing_nodes() {
    let mut pipeline = chain();
    assert_eq!(pipeline.set_param("score_threshold", "0.9"), 1);
    assert_eq!(pipeline.set_param("resize_ratio", "0.5"), 1);
    assert_eq!(pipeline.set_param("unknown_key", "x"), 0);
    // Bad numeric values are ignored, not applied.
    assert_eq!(pipeline.set_param("score_threshold", "NaN"), 0);
}

#[test]
fn source_failures_accumulate() {
    let mut pipeline = chain();
    assert_eq!(pipeline.source_failures(), 0);
    pipeline.record_source_failure();
    pipeline.record_source_failure();
    assert_eq!(pipeline.source_failures(), 2);
}

#[test]
#[serial]
fn osd_font_requirement_follows_env() {
    // Unset: built-in default font.
    std::env::remove_var("OSD_DEFAULT_FONT_PATH");
    let osd = OsdNode::new("osd", NodeKind::FaceOsd).unwrap();
    assert!(osd.font_path().is_some());

    // Explicitly empty: font requirement disabled.
    std::env::set_var("OSD_DEFAULT_FONT_PATH", "");
    let osd = OsdNode::new("osd", NodeKind::FaceOsd).unwrap();
    assert!(osd.font_path().is_none());
    std::env::remove_var("OSD_DEFAULT_FONT_PATH");
}
