// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn type_bytes_are_stable() {
    assert_eq!(MessageType::Ping.as_byte(), 0);
    assert_eq!(MessageType::CreateInstance.as_byte(), 10);
    assert_eq!(MessageType::UpdateInstanceResponse.as_byte(), 19);
    assert_eq!(MessageType::WorkerReady.as_byte(), 32);
    assert_eq!(MessageType::ErrorResponse.as_byte(), 255);
    for byte in [0u8, 1, 2, 3, 10, 15, 20, 25, 30, 33, 255] {
        assert_eq!(MessageType::from_byte(byte).map(MessageType::as_byte), Some(byte));
    }
    assert!(MessageType::from_byte(4).is_none());
    assert!(MessageType::from_byte(99).is_none());
}

#[test]
fn response_payload_shape() {
    let ok = response(ResponseStatus::Ok, "started");
    assert_eq!(ok["status"], 0);
    assert_eq!(ok["success"], true);
    assert_eq!(ok["message"], "started");

    let err = error_response("no such instance", ResponseStatus::NotFound);
    assert_eq!(err["status"], 2);
    assert_eq!(err["success"], false);
    assert_eq!(err["error"], "no such instance");
}

#[test]
fn timeout_message_shape() {
    let msg = IpcMessage::timeout();
    assert_eq!(msg.msg_type, MessageType::ErrorResponse);
    assert_eq!(msg.status(), ResponseStatus::Timeout.as_i64());
    assert!(!msg.success());
}
