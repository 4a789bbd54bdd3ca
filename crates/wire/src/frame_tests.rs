// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use super::*;

fn msg(msg_type: MessageType, payload: serde_json::Value) -> IpcMessage {
    IpcMessage::with_payload(msg_type, payload)
}

#[tokio::test]
async fn round_trip() {
    let original = msg(
        MessageType::CreateInstance,
        json!({"instance_id": "abc", "config": {"name": "cam", "frameRateLimit": 15}}),
    );
    let buf = encode(&original).unwrap();
    let mut reader = buf.as_slice();
    let decoded = decode(&mut reader).await.unwrap();
    assert_eq!(decoded, original);
}

#[tokio::test]
async fn empty_payload_round_trip() {
    let original = IpcMessage::new(MessageType::Ping);
    let buf = encode(&original).unwrap();
    assert_eq!(buf.len(), HEADER_SIZE + 2); // "{}"
    let decoded = decode(&mut buf.as_slice()).await.unwrap();
    assert_eq!(decoded, original);
}

#[tokio::test]
async fn header_layout_is_bit_exact() {
    let buf = encode(&IpcMessage::new(MessageType::WorkerReady)).unwrap();
    assert_eq!(&buf[0..4], b"EDGE");
    assert_eq!(buf[4], 1); // version
    assert_eq!(buf[5], 32); // WORKER_READY
    assert_eq!(&buf[6..8], &[0, 0]); // reserved
    assert_eq!(u64::from_le_bytes(buf[8..16].try_into().unwrap()), 2);
}

#[tokio::test]
async fn corrupted_magic_rejected() {
    let mut buf = encode(&IpcMessage::new(MessageType::Ping)).unwrap();
    buf[0] = b'X';
    let err = decode(&mut buf.as_slice()).await.unwrap_err();
    assert!(matches!(err, FrameError::InvalidFrame(_)), "{err:?}");
}

#[tokio::test]
async fn wrong_version_rejected() {
    let mut buf = encode(&IpcMessage::new(MessageType::Ping)).unwrap();
    buf[4] = 2;
    let err = decode(&mut buf.as_slice()).await.unwrap_err();
    assert!(matches!(err, FrameError::InvalidFrame(_)), "{err:?}");
}

#[tokio::test]
async fn unknown_type_rejected() {
    let mut buf = encode(&IpcMessage::new(MessageType::Ping)).unwrap();
    buf[5] = 99;
    let err = decode(&mut buf.as_slice()).await.unwrap_err();
    assert!(matches!(err, FrameError::InvalidFrame(_)), "{err:?}");
}

#[tokio::test]
async fn oversized_frame_rejected_without_draining() {
    // Header claiming 2^34 payload bytes, followed by a well-formed frame.
    let mut buf = Vec::new();
    buf.extend_from_slice(b"EDGE");
    buf.push(1);
    buf.push(0); // PING
    buf.extend_from_slice(&[0, 0]);
    buf.extend_from_slice(&(1u64 << 34).to_le_bytes());
    let next = IpcMessage::new(MessageType::Pong);
    buf.extend_from_slice(&encode(&next).unwrap());

    let mut reader = buf.as_slice();
    let err = decode(&mut reader).await.unwrap_err();
    assert!(matches!(err, FrameError::TooLarge(s) if s == 1 << 34), "{err:?}");

    // No body bytes were consumed: the next frame decodes cleanly.
    let decoded = decode(&mut reader).await.unwrap();
    assert_eq!(decoded, next);
}

#[tokio::test]
async fn truncated_payload_reported() {
    let buf = encode(&msg(MessageType::Ping, json!({"k": "value"}))).unwrap();
    let cut = &buf[..buf.len() - 3];
    let err = decode(&mut &cut[..]).await.unwrap_err();
    assert!(matches!(err, FrameError::Truncated), "{err:?}");
}

#[tokio::test]
async fn eof_at_frame_boundary_is_connection_closed() {
    let err = decode(&mut &[][..]).await.unwrap_err();
    assert!(matches!(err, FrameError::ConnectionClosed), "{err:?}");
}

#[tokio::test]
async fn invalid_json_payload_rejected() {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"EDGE");
    buf.push(1);
    buf.push(0);
    buf.extend_from_slice(&[0, 0]);
    buf.extend_from_slice(&4u64.to_le_bytes());
    buf.extend_from_slice(b"nope");
    let err = decode(&mut buf.as_slice()).await.unwrap_err();
    assert!(matches!(err, FrameError::Json(_)), "{err:?}");
}
