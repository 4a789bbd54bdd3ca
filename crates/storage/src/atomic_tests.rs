// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn writes_through_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sub").join("doc.json");
    write_atomic(&path, b"{}").unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"{}");
    assert!(!path.with_extension("tmp").exists(), "temp file renamed away");
}

#[test]
fn overwrites_existing_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.json");
    write_atomic(&path, b"old").unwrap();
    write_atomic(&path, b"new").unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"new");
}
