// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn group_id_pattern() {
    validate_group_id("cameras_2").unwrap();
    validate_group_id("front-lot").unwrap();
    assert!(validate_group_id("").is_err());
    assert!(validate_group_id("has space").is_err());
    assert!(validate_group_id("slash/").is_err());
}

#[test]
fn group_name_pattern_allows_spaces() {
    validate_group_name("Front Lot Cameras").unwrap();
    assert!(validate_group_name("").is_err());
    assert!(validate_group_name("bad/name").is_err());
}
