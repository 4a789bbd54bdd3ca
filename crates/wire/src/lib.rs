// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for supervisor ↔ worker communication.
//!
//! Wire format: 16-byte header (magic "EDGE", version, type, reserved,
//! u64-LE payload length) + UTF-8 JSON payload over a Unix stream socket.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod frame;
mod message;
mod server;

pub use client::{ClientError, WorkerClient};
pub use frame::{
    decode, encode, read_message, write_message, FrameError, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use message::{
    error_response, response, response_data, IpcMessage, MessageType, ResponseStatus,
};
pub use server::{MessageHandler, WorkerServer};

#[cfg(test)]
mod property_tests;
