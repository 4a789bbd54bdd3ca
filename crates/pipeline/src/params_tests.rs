// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn resize_ratio_clamping() {
    assert_eq!(clamp_resize_ratio(0.5), 0.5);
    assert_eq!(clamp_resize_ratio(1.0), 1.0);
    assert_eq!(clamp_resize_ratio(0.0), 0.1);
    assert_eq!(clamp_resize_ratio(-3.0), 0.1);
    assert_eq!(clamp_resize_ratio(2.5), 1.0);
}

#[test]
fn threshold_clamping() {
    assert_eq!(clamp_threshold("t", 0.7), 0.7);
    assert_eq!(clamp_threshold("t", -0.1), 0.0);
    assert_eq!(clamp_threshold("t", 1.5), 1.0);
}

#[test]
fn negative_counts_coerced() {
    assert_eq!(non_negative_or("channel", -1, 0), 0);
    assert_eq!(non_negative_or("bitrate", -500, 1024), 1024);
    assert_eq!(non_negative_or("channel", 2, 0), 2);
}

#[test]
fn nan_and_infinity_rejected() {
    assert!(parse_finite("t", "NaN").is_err());
    assert!(parse_finite("t", "inf").is_err());
    assert!(parse_finite("t", "-inf").is_err());
    assert!(parse_finite("t", "abc").is_err());
    assert_eq!(parse_finite("t", "0.25").unwrap(), 0.25);
}
