// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-prefixed frame codec.
//!
//! Header layout (16 bytes):
//! ```text
//! offset 0..3   : ASCII "EDGE"
//! offset 4      : u8 version = 1
//! offset 5      : u8 message type
//! offset 6..7   : u16 reserved = 0
//! offset 8..15  : u64 little-endian payload length
//! ```
//! The payload is UTF-8 JSON of exactly the declared length.

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::message::{IpcMessage, MessageType};

const MAGIC: &[u8; 4] = b"EDGE";
const VERSION: u8 = 1;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 16;

/// Ceiling on the declared payload size. A frame claiming more is rejected
/// without reading the body.
pub const MAX_PAYLOAD_SIZE: u64 = 16 * 1024 * 1024;

/// Frame codec errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Bad magic, wrong version, or unknown message type.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Declared payload size above [`MAX_PAYLOAD_SIZE`].
    #[error("frame too large: {0} bytes")]
    TooLarge(u64),

    /// Payload was not valid JSON.
    #[error("payload parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stream ended mid-frame.
    #[error("truncated frame")]
    Truncated,

    /// Peer closed the connection at a frame boundary.
    #[error("connection closed")]
    ConnectionClosed,

    #[error("io error: {0}")]
    Io(std::io::Error),
}

/// Encode a message into a single buffer (header + payload).
pub fn encode(msg: &IpcMessage) -> Result<Vec<u8>, FrameError> {
    let payload = serde_json::to_vec(&msg.payload)?;
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);
    buf.push(msg.msg_type.as_byte());
    buf.extend_from_slice(&[0u8; 2]);
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode one message from a stream.
///
/// Reads exactly [`HEADER_SIZE`] bytes, validates them, then reads exactly
/// the declared payload length. An oversized declared length fails before
/// any payload byte is consumed, so the caller decides whether the stream is
/// still usable (single-connection servers close it).
pub async fn decode<R>(reader: &mut R) -> Result<IpcMessage, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => FrameError::ConnectionClosed,
        _ => FrameError::Io(e),
    })?;

    if &header[0..4] != MAGIC {
        return Err(FrameError::InvalidFrame(format!("bad magic {:02x?}", &header[0..4])));
    }
    if header[4] != VERSION {
        return Err(FrameError::InvalidFrame(format!("unsupported version {}", header[4])));
    }
    let msg_type = MessageType::from_byte(header[5])
        .ok_or_else(|| FrameError::InvalidFrame(format!("unknown message type {}", header[5])))?;

    let mut size_bytes = [0u8; 8];
    size_bytes.copy_from_slice(&header[8..16]);
    let payload_size = u64::from_le_bytes(size_bytes);
    if payload_size > MAX_PAYLOAD_SIZE {
        return Err(FrameError::TooLarge(payload_size));
    }

    let mut payload = vec![0u8; payload_size as usize];
    reader.read_exact(&mut payload).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => FrameError::Truncated,
        _ => FrameError::Io(e),
    })?;

    let payload: Value = serde_json::from_slice(&payload)?;
    Ok(IpcMessage { msg_type, payload })
}

/// Write one message to a stream.
pub async fn write_message<W>(writer: &mut W, msg: &IpcMessage) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let buf = encode(msg)?;
    writer.write_all(&buf).await.map_err(FrameError::Io)?;
    writer.flush().await.map_err(FrameError::Io)?;
    Ok(())
}

/// Read one message from a stream. Alias for [`decode`], exported for
/// symmetry with [`write_message`].
pub async fn read_message<R>(reader: &mut R) -> Result<IpcMessage, FrameError>
where
    R: AsyncRead + Unpin,
{
    decode(reader).await
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
