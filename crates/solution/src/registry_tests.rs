// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ea_core::{Error, NodeConfig, SolutionConfig};
use ea_storage::SolutionStorage;

use super::*;

fn custom(id: &str) -> SolutionConfig {
    SolutionConfig {
        solution_id: id.into(),
        solution_name: "Custom".into(),
        solution_type: "face_detection".into(),
        is_default: false,
        pipeline: vec![NodeConfig {
            node_type: "rtsp_src".into(),
            node_name: "src_{instanceId}".into(),
            parameters: Default::default(),
        }],
        defaults: Default::default(),
    }
}

fn seeded() -> SolutionRegistry {
    let registry = SolutionRegistry::new();
    registry.initialize_defaults();
    registry
}

#[test]
fn defaults_are_seeded() {
    let registry = seeded();
    assert!(registry.has("face_detection"));
    assert!(registry.is_default("face_detection"));
    assert_eq!(registry.list().len(), 4);
    assert_eq!(registry.get_all().len(), 4);
}

#[test]
fn default_solutions_cannot_be_deleted_or_updated() {
    let registry = seeded();
    assert!(matches!(registry.delete("face_detection"), Err(Error::Conflict(_))));
    assert!(matches!(registry.update(custom("face_detection")), Err(Error::Conflict(_))));
    assert!(matches!(registry.register(custom("face_detection")), Err(Error::Conflict(_))));
    assert!(registry.has("face_detection"));
}

#[test]
fn custom_lifecycle() {
    let registry = seeded();
    registry.register(custom("lobby")).unwrap();
    assert!(registry.has("lobby"));
    assert!(!registry.is_default("lobby"));

    let mut updated = custom("lobby");
    updated.solution_name = "Lobby v2".into();
    registry.update(updated).unwrap();
    assert_eq!(registry.get("lobby").unwrap().solution_name, "Lobby v2");

    registry.delete("lobby").unwrap();
    assert!(!registry.has("lobby"));
    assert!(matches!(registry.delete("lobby"), Err(Error::NotFound(_))));
}

#[test]
fn register_forces_is_default_off() {
    let registry = seeded();
    let mut sneaky = custom("sneaky");
    sneaky.is_default = true;
    registry.register(sneaky).unwrap();
    assert!(!registry.is_default("sneaky"));
    registry.delete("sneaky").unwrap();
}

#[test]
fn empty_pipeline_rejected() {
    let registry = seeded();
    let mut bad = custom("bad");
    bad.pipeline.clear();
    assert!(matches!(registry.register(bad), Err(Error::Validation(_))));
}

#[test]
fn customs_persist_and_reload_while_defaults_stay_off_disk() {
    let dir = tempfile::tempdir().unwrap();

    {
        let registry = SolutionRegistry::with_storage(SolutionStorage::new(dir.path()));
        registry.initialize_defaults();
        registry.register(custom("lobby")).unwrap();
    }

    let document: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("solutions.json")).unwrap(),
    )
    .unwrap();
    let keys: Vec<&str> = document.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["lobby"], "only customs reach disk");

    // Fresh registry: defaults from code, customs from disk.
    let registry = SolutionRegistry::with_storage(SolutionStorage::new(dir.path()));
    registry.initialize_defaults();
    registry.load_persisted();
    assert!(registry.has("face_detection"));
    assert!(registry.has("lobby"));
    assert!(!registry.is_default("lobby"));
}
