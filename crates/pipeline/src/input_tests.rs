// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn classifies_by_scheme() {
    assert_eq!(detect_input_type("rtsp://cam/stream"), InputType::Rtsp);
    assert_eq!(detect_input_type("RTSP://CAM/STREAM"), InputType::Rtsp);
    assert_eq!(detect_input_type("rtmp://server/live"), InputType::Rtmp);
    assert_eq!(detect_input_type("http://host/video.mp4"), InputType::Http);
    assert_eq!(detect_input_type("https://host/stream.m3u8"), InputType::Hls);
    assert_eq!(detect_input_type("https://host/stream.m3u8?token=x"), InputType::Hls);
}

#[test]
fn everything_else_is_a_file() {
    assert_eq!(detect_input_type("/videos/demo.mp4"), InputType::File);
    assert_eq!(detect_input_type("relative/path.avi"), InputType::File);
    assert_eq!(detect_input_type(""), InputType::File);
}
