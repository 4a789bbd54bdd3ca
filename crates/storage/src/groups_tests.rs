// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ea_core::GroupInfo;

use super::*;

fn group(id: &str) -> GroupInfo {
    GroupInfo {
        group_id: id.into(),
        display_name: format!("Group {id}"),
        ..Default::default()
    }
}

#[test]
fn per_group_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let storage = GroupStorage::new(dir.path());
    storage.save(&group("cameras")).unwrap();

    assert!(dir.path().join("groups").join("cameras.json").exists());
    let loaded = storage.load("cameras").unwrap().unwrap();
    assert_eq!(loaded.display_name, "Group cameras");
}

#[test]
fn load_all_sorted_and_tolerant() {
    let dir = tempfile::tempdir().unwrap();
    let storage = GroupStorage::new(dir.path());
    storage.save(&group("b")).unwrap();
    storage.save(&group("a")).unwrap();
    std::fs::write(dir.path().join("groups").join("junk.json"), b"not json").unwrap();

    let all = storage.load_all();
    assert_eq!(all.iter().map(|g| g.group_id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
}

#[test]
fn invalid_group_id_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let storage = GroupStorage::new(dir.path());
    assert!(storage.save(&group("../escape")).is_err());
}

#[test]
fn delete_missing_group_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let storage = GroupStorage::new(dir.path());
    storage.delete("absent").unwrap();
}
