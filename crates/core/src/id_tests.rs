// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn generated_ids_are_valid_and_unique() {
    let a = new_instance_id();
    let b = new_instance_id();
    assert_ne!(a, b);
    validate_instance_id(&a).unwrap();
    assert_eq!(a.len(), 36);
}

#[test]
fn short_or_unhyphenated_ids_rejected() {
    assert!(validate_instance_id("abc").is_err());
    assert!(validate_instance_id("0123456789012345678901234567890123456").is_err());
}

#[test]
fn uuid_like_keys_detected() {
    assert!(looks_like_uuid("550e8400-e29b-41d4-a716-446655440000"));
    assert!(!looks_like_uuid("Detector"));
    assert!(!looks_like_uuid("a-b"));
}
