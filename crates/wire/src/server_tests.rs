// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::*;
use crate::message::{response, MessageType, ResponseStatus};
use crate::WorkerClient;

struct Echo;

#[async_trait]
impl MessageHandler for Echo {
    async fn handle(&self, msg: IpcMessage) -> IpcMessage {
        match msg.msg_type {
            MessageType::Ping => IpcMessage::new(MessageType::Pong),
            _ => IpcMessage::with_payload(
                MessageType::ErrorResponse,
                response(ResponseStatus::Ok, "echo"),
            ),
        }
    }

    async fn on_client_connected(&self) -> Option<IpcMessage> {
        Some(IpcMessage::with_payload(MessageType::WorkerReady, json!({"instance_id": "t"})))
    }
}

#[tokio::test]
async fn greeting_then_request_response() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("w.sock");
    let mut server = WorkerServer::bind(&path).unwrap();
    server.start(Arc::new(Echo)).unwrap();

    let client = WorkerClient::new(server.socket_path());
    client.connect(Duration::from_secs(1)).await.unwrap();

    let greeting = client.receive(Duration::from_secs(1)).await.unwrap();
    assert_eq!(greeting.msg_type, MessageType::WorkerReady);

    let pong = client
        .send_and_receive(&IpcMessage::new(MessageType::Ping), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(pong.msg_type, MessageType::Pong);

    server.stop().await;
    assert!(!path.exists(), "socket unlinked on stop");
}

#[tokio::test]
async fn stale_socket_is_unlinked_on_bind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stale.sock");
    std::fs::write(&path, b"stale").unwrap();

    let mut server = WorkerServer::bind(&path).unwrap();
    server.start(Arc::new(Echo)).unwrap();
    let client = WorkerClient::new(server.socket_path());
    client.connect(Duration::from_secs(1)).await.unwrap();
    server.stop().await;
}

#[tokio::test]
async fn next_connection_succeeds_after_oversized_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("w.sock");
    let mut server = WorkerServer::bind(&path).unwrap();
    server.start(Arc::new(Echo)).unwrap();

    // First connection sends a frame claiming 2^34 bytes; the server closes it.
    {
        use tokio::io::AsyncWriteExt;
        let mut stream = tokio::net::UnixStream::connect(server.socket_path()).await.unwrap();
        let mut buf = Vec::new();
        buf.extend_from_slice(b"EDGE");
        buf.push(1);
        buf.push(0);
        buf.extend_from_slice(&[0, 0]);
        buf.extend_from_slice(&(1u64 << 34).to_le_bytes());
        stream.write_all(&buf).await.unwrap();
        // Greeting arrives, then the connection closes without a response.
        let mut reader = tokio::io::BufReader::new(stream);
        let greeting = crate::read_message(&mut reader).await.unwrap();
        assert_eq!(greeting.msg_type, MessageType::WorkerReady);
        let result = crate::read_message(&mut reader).await;
        assert!(result.is_err());
    }

    // A fresh connection is served normally.
    let client = WorkerClient::new(server.socket_path());
    client.connect(Duration::from_secs(1)).await.unwrap();
    let greeting = client.receive(Duration::from_secs(1)).await.unwrap();
    assert_eq!(greeting.msg_type, MessageType::WorkerReady);
    let pong = client
        .send_and_receive(&IpcMessage::new(MessageType::Ping), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(pong.msg_type, MessageType::Pong);

    server.stop().await;
}
