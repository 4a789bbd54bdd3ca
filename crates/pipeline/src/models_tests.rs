// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serial_test::serial;

use super::*;

fn with_data_root<R>(f: impl FnOnce(&std::path::Path) -> R) -> R {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("CVEDIX_DATA_ROOT", dir.path());
    let result = f(dir.path());
    std::env::remove_var("CVEDIX_DATA_ROOT");
    result
}

#[test]
#[serial]
fn data_root_is_searched_first() {
    with_data_root(|root| {
        let face_dir = root.join("models/face");
        std::fs::create_dir_all(&face_dir).unwrap();
        std::fs::write(face_dir.join("yunet.onnx"), b"model").unwrap();

        let resolved = resolve_model_path("models/face/yunet.onnx");
        assert_eq!(resolved, face_dir.join("yunet.onnx"));
    });
}

#[test]
#[serial]
fn missing_yunet_falls_back_to_dated_alternative() {
    with_data_root(|root| {
        let face_dir = root.join("models/face");
        std::fs::create_dir_all(&face_dir).unwrap();
        std::fs::write(face_dir.join("face_detection_yunet_2023mar.onnx"), b"model").unwrap();

        let resolved = resolve_model_path("models/face/yunet.onnx");
        assert_eq!(resolved, face_dir.join("face_detection_yunet_2023mar.onnx"));
    });
}

#[test]
#[serial]
fn newer_alternative_preferred() {
    with_data_root(|root| {
        let face_dir = root.join("models/face");
        std::fs::create_dir_all(&face_dir).unwrap();
        std::fs::write(face_dir.join("face_detection_yunet_2022mar.onnx"), b"old").unwrap();
        std::fs::write(face_dir.join("face_detection_yunet_2023mar.onnx"), b"new").unwrap();

        let resolved = resolve_model_path("models/face/yunet.onnx");
        assert_eq!(resolved, face_dir.join("face_detection_yunet_2023mar.onnx"));
    });
}

#[test]
#[serial]
fn unresolvable_path_returns_default_relative() {
    with_data_root(|_| {
        let resolved = resolve_model_path("models/face/nonexistent.onnx");
        assert_eq!(resolved, std::path::PathBuf::from("./cvedix_data/models/face/nonexistent.onnx"));
    });
}

#[test]
#[serial]
fn resolve_by_exact_name() {
    with_data_root(|root| {
        let face_dir = root.join("models/face");
        std::fs::create_dir_all(&face_dir).unwrap();
        std::fs::write(face_dir.join("yunet_2023mar.onnx"), b"model").unwrap();

        let resolved = resolve_model_by_name("yunet_2023mar", "face").unwrap();
        assert_eq!(resolved, face_dir.join("yunet_2023mar.onnx"));
    });
}

#[test]
#[serial]
fn resolve_by_name_tries_face_detection_prefix() {
    with_data_root(|root| {
        let face_dir = root.join("models/face");
        std::fs::create_dir_all(&face_dir).unwrap();
        std::fs::write(face_dir.join("face_detection_yunet_2023mar.onnx"), b"model").unwrap();

        let resolved = resolve_model_by_name("yunet_2023mar", "face").unwrap();
        assert_eq!(resolved, face_dir.join("face_detection_yunet_2023mar.onnx"));
    });
}

#[test]
#[serial]
fn exact_match_beats_case_insensitive_contains() {
    with_data_root(|root| {
        let face_dir = root.join("models/face");
        std::fs::create_dir_all(&face_dir).unwrap();
        std::fs::write(face_dir.join("YUNET_2023MAR.ONNX.bak"), b"fuzzy").unwrap();
        std::fs::write(face_dir.join("yunet_2023mar.onnx"), b"exact").unwrap();

        let resolved = resolve_model_by_name("yunet_2023mar", "face").unwrap();
        assert_eq!(resolved, face_dir.join("yunet_2023mar.onnx"));
    });
}

#[test]
#[serial]
fn unknown_name_is_none() {
    with_data_root(|_| {
        assert!(resolve_model_by_name("no_such_model", "face").is_none());
    });
}

#[test]
#[serial]
fn list_models_dedupes_and_filters_extensions() {
    with_data_root(|root| {
        let face_dir = root.join("models/face");
        std::fs::create_dir_all(&face_dir).unwrap();
        std::fs::write(face_dir.join("a.onnx"), b"x").unwrap();
        std::fs::write(face_dir.join("b.tflite"), b"x").unwrap();
        std::fs::write(face_dir.join("notes.txt"), b"x").unwrap();

        let models = list_available_models("face");
        let names: Vec<String> = models
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.onnx", "b.tflite"]);
    });
}
