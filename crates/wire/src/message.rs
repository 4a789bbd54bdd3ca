// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message types and response payload helpers.

use serde_json::{json, Value};

/// IPC message type byte. Numeric values are part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    // Worker lifecycle
    Ping = 0,
    Pong = 1,
    Shutdown = 2,
    ShutdownAck = 3,

    // Instance commands with paired responses
    CreateInstance = 10,
    CreateInstanceResponse = 11,
    DeleteInstance = 12,
    DeleteInstanceResponse = 13,
    StartInstance = 14,
    StartInstanceResponse = 15,
    StopInstance = 16,
    StopInstanceResponse = 17,
    UpdateInstance = 18,
    UpdateInstanceResponse = 19,

    // Queries
    GetInstanceStatus = 20,
    GetInstanceStatusResponse = 21,
    GetStatistics = 22,
    GetStatisticsResponse = 23,
    GetLastFrame = 24,
    GetLastFrameResponse = 25,

    // Events (worker -> supervisor)
    InstanceStateChanged = 30,
    InstanceError = 31,
    WorkerReady = 32,
    WorkerMemoryWarning = 33,

    ErrorResponse = 255,
}

impl MessageType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => MessageType::Ping,
            1 => MessageType::Pong,
            2 => MessageType::Shutdown,
            3 => MessageType::ShutdownAck,
            10 => MessageType::CreateInstance,
            11 => MessageType::CreateInstanceResponse,
            12 => MessageType::DeleteInstance,
            13 => MessageType::DeleteInstanceResponse,
            14 => MessageType::StartInstance,
            15 => MessageType::StartInstanceResponse,
            16 => MessageType::StopInstance,
            17 => MessageType::StopInstanceResponse,
            18 => MessageType::UpdateInstance,
            19 => MessageType::UpdateInstanceResponse,
            20 => MessageType::GetInstanceStatus,
            21 => MessageType::GetInstanceStatusResponse,
            22 => MessageType::GetStatistics,
            23 => MessageType::GetStatisticsResponse,
            24 => MessageType::GetLastFrame,
            25 => MessageType::GetLastFrameResponse,
            30 => MessageType::InstanceStateChanged,
            31 => MessageType::InstanceError,
            32 => MessageType::WorkerReady,
            33 => MessageType::WorkerMemoryWarning,
            255 => MessageType::ErrorResponse,
            _ => return None,
        })
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Response status carried in every response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum ResponseStatus {
    Ok = 0,
    Error = 1,
    NotFound = 2,
    AlreadyExists = 3,
    InvalidRequest = 4,
    InternalError = 5,
    Timeout = 6,
}

impl ResponseStatus {
    pub fn as_i64(self) -> i64 {
        self as i64
    }
}

/// One framed message: a type byte and a JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct IpcMessage {
    pub msg_type: MessageType,
    pub payload: Value,
}

impl IpcMessage {
    pub fn new(msg_type: MessageType) -> Self {
        IpcMessage { msg_type, payload: json!({}) }
    }

    pub fn with_payload(msg_type: MessageType, payload: Value) -> Self {
        IpcMessage { msg_type, payload }
    }

    /// The numeric `status` of a response payload, `Ok` when absent.
    pub fn status(&self) -> i64 {
        self.payload.get("status").and_then(Value::as_i64).unwrap_or(0)
    }

    /// Whether a response payload reports success.
    pub fn success(&self) -> bool {
        self.payload.get("success").and_then(Value::as_bool).unwrap_or(false)
    }

    /// The `error` string of a failed response, if any.
    pub fn error(&self) -> Option<&str> {
        self.payload.get("error").and_then(Value::as_str)
    }

    /// The ERROR_RESPONSE a client synthesizes when a receive times out.
    pub fn timeout() -> Self {
        IpcMessage {
            msg_type: MessageType::ErrorResponse,
            payload: error_response("timed out waiting for response", ResponseStatus::Timeout),
        }
    }
}

/// Standard success/failure response payload.
pub fn response(status: ResponseStatus, message: &str) -> Value {
    json!({
        "status": status.as_i64(),
        "success": status == ResponseStatus::Ok,
        "message": message,
    })
}

/// Success response payload carrying data.
pub fn response_data(status: ResponseStatus, message: &str, data: Value) -> Value {
    json!({
        "status": status.as_i64(),
        "success": status == ResponseStatus::Ok,
        "message": message,
        "data": data,
    })
}

/// Error response payload.
pub fn error_response(error: &str, status: ResponseStatus) -> Value {
    json!({
        "status": status.as_i64(),
        "success": false,
        "error": error,
    })
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
