// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;
use serial_test::serial;

use ea_solution::SolutionRegistry;
use ea_wire::{IpcMessage, MessageHandler, MessageType, ResponseStatus};

use super::*;
use crate::frame::FrameData;

fn handler_with(config: serde_json::Value) -> WorkerHandler {
    std::env::set_var("OSD_DEFAULT_FONT_PATH", "");
    let registry = SolutionRegistry::new();
    registry.initialize_defaults();
    WorkerHandler::new("550e8400-e29b-41d4-a716-446655440000", config, registry)
}

fn face_config() -> serde_json::Value {
    json!({
        "name": "A",
        "solution": "face_detection",
        "detectionSensitivity": "Medium",
        "additionalParams": {"RTSP_URL": "rtsp://x/y"}
    })
}

fn command(msg_type: MessageType, payload: serde_json::Value) -> IpcMessage {
    IpcMessage::with_payload(msg_type, payload)
}

#[tokio::test]
#[serial]
async fn ping_pongs() {
    let handler = handler_with(face_config());
    let resp = handler.handle(IpcMessage::new(MessageType::Ping)).await;
    assert_eq!(resp.msg_type, MessageType::Pong);
}

#[tokio::test]
#[serial]
async fn start_stop_lifecycle() {
    let handler = handler_with(face_config());
    handler.build_initial_pipeline().unwrap();

    let resp = handler.handle(IpcMessage::new(MessageType::StartInstance)).await;
    assert_eq!(resp.msg_type, MessageType::StartInstanceResponse);
    assert!(resp.success(), "{:?}", resp.payload);
    handler.wait_start_settled().await;
    assert_eq!(handler.current_state(), "running");

    let resp = handler.handle(IpcMessage::new(MessageType::StopInstance)).await;
    assert!(resp.success());
    handler.wait_stop_settled().await;
    assert_eq!(handler.current_state(), "stopped");
}

#[tokio::test]
#[serial]
async fn start_without_solution_reports_error() {
    let handler = handler_with(json!({"name": "A"}));
    let resp = handler.handle(IpcMessage::new(MessageType::StartInstance)).await;
    assert!(resp.success(), "start is accepted, failure lands in state");
    handler.wait_start_settled().await;
    assert_eq!(handler.current_state(), "error");
    let stats = handler.statistics();
    assert!(stats.last_error.contains("no solution configured"), "{}", stats.last_error);
}

#[tokio::test]
#[serial]
async fn update_with_sensitivity_applies_in_place() {
    let handler = handler_with(face_config());
    handler.build_initial_pipeline().unwrap();
    handler.handle(IpcMessage::new(MessageType::StartInstance)).await;
    handler.wait_start_settled().await;

    let resp = handler
        .handle(command(
            MessageType::UpdateInstance,
            json!({"config": {"detectionSensitivity": "High"}}),
        ))
        .await;
    assert_eq!(resp.msg_type, MessageType::UpdateInstanceResponse);
    assert!(resp.success(), "{:?}", resp.payload);
    assert_eq!(resp.payload["message"], "applied in place");

    // Statistics keep flowing, state stays running throughout.
    let stats = handler.statistics();
    assert_eq!(stats.state, "running");
}

#[tokio::test]
#[serial]
async fn update_with_new_source_hot_swaps() {
    let handler = handler_with(face_config());
    handler.build_initial_pipeline().unwrap();
    handler.handle(IpcMessage::new(MessageType::StartInstance)).await;
    handler.wait_start_settled().await;

    let resp = handler
        .handle(command(
            MessageType::UpdateInstance,
            json!({"config": {"additionalParams": {"RTSP_URL": "rtsp://other/1"}}}),
        ))
        .await;
    assert!(resp.success(), "{:?}", resp.payload);
    assert_eq!(resp.payload["message"], "pipeline rebuilt");
    assert_eq!(handler.current_state(), "running", "hot swap keeps the instance running");
}

#[tokio::test]
#[serial]
async fn statistics_reflect_frames_and_state() {
    let handler = handler_with(face_config());
    handler.record_frame(FrameData { data: vec![0; 8], width: 2, height: 2 });
    handler.record_frame(FrameData { data: vec![1; 8], width: 2, height: 2 });
    handler.record_dropped_frame();

    let resp = handler.handle(IpcMessage::new(MessageType::GetStatistics)).await;
    assert_eq!(resp.msg_type, MessageType::GetStatisticsResponse);
    let data = &resp.payload["data"];
    assert_eq!(data["framesProcessed"], 2);
    assert_eq!(data["droppedFrames"], 1);
}

#[tokio::test]
#[serial]
async fn last_frame_round_trips_base64() {
    let handler = handler_with(face_config());

    let resp = handler.handle(IpcMessage::new(MessageType::GetLastFrame)).await;
    assert_eq!(resp.status(), ResponseStatus::NotFound.as_i64());

    handler.record_frame(FrameData { data: vec![7; 4], width: 2, height: 2 });
    let resp = handler.handle(IpcMessage::new(MessageType::GetLastFrame)).await;
    assert!(resp.success());
    assert_eq!(resp.payload["data"]["width"], 2);
    assert_eq!(resp.payload["data"]["frame"], "BwcHBw==");
}

#[tokio::test]
#[serial]
async fn shutdown_cancels_token() {
    let handler = handler_with(face_config());
    let token = handler.shutdown_token();
    assert!(!token.is_cancelled());
    let resp = handler.handle(IpcMessage::new(MessageType::Shutdown)).await;
    assert_eq!(resp.msg_type, MessageType::ShutdownAck);
    assert!(token.is_cancelled());
}

#[tokio::test]
#[serial]
async fn worker_ready_pushed_on_connect() {
    let handler = handler_with(face_config());
    let greeting = handler.on_client_connected().await.unwrap();
    assert_eq!(greeting.msg_type, MessageType::WorkerReady);
    assert_eq!(greeting.payload["instance_id"], "550e8400-e29b-41d4-a716-446655440000");
}
