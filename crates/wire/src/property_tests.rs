// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property tests for the frame codec: every valid (type, payload) pair
//! survives an encode/decode round trip.

use proptest::prelude::*;
use serde_json::json;

use crate::{decode, encode, IpcMessage, MessageType};

const ALL_TYPES: &[MessageType] = &[
    MessageType::Ping,
    MessageType::Pong,
    MessageType::Shutdown,
    MessageType::ShutdownAck,
    MessageType::CreateInstance,
    MessageType::CreateInstanceResponse,
    MessageType::DeleteInstance,
    MessageType::DeleteInstanceResponse,
    MessageType::StartInstance,
    MessageType::StartInstanceResponse,
    MessageType::StopInstance,
    MessageType::StopInstanceResponse,
    MessageType::UpdateInstance,
    MessageType::UpdateInstanceResponse,
    MessageType::GetInstanceStatus,
    MessageType::GetInstanceStatusResponse,
    MessageType::GetStatistics,
    MessageType::GetStatisticsResponse,
    MessageType::GetLastFrame,
    MessageType::GetLastFrameResponse,
    MessageType::InstanceStateChanged,
    MessageType::InstanceError,
    MessageType::WorkerReady,
    MessageType::WorkerMemoryWarning,
    MessageType::ErrorResponse,
];

proptest! {
    #[test]
    fn round_trip_any_type_and_payload(
        type_idx in 0..ALL_TYPES.len(),
        keys in proptest::collection::btree_map("[a-z_]{1,12}", ".{0,64}", 0..8),
        n in any::<i64>(),
    ) {
        let mut payload = serde_json::Map::new();
        for (k, v) in keys {
            payload.insert(k, json!(v));
        }
        payload.insert("n".to_string(), json!(n));

        let original = IpcMessage::with_payload(ALL_TYPES[type_idx], payload.into());
        let buf = encode(&original).unwrap();

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let decoded = rt.block_on(decode(&mut buf.as_slice())).unwrap();
        prop_assert_eq!(decoded, original);
    }

    #[test]
    fn corrupted_first_bytes_never_decode(byte in 0u8..255) {
        prop_assume!(byte != b'E');
        let mut buf = encode(&IpcMessage::new(MessageType::Ping)).unwrap();
        buf[0] = byte;
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        prop_assert!(rt.block_on(decode(&mut buf.as_slice())).is_err());
    }
}
