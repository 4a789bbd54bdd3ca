// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pipeline builder: interprets a solution template against a request.
//!
//! Substitution happens in two layers: the literal `{instanceId}` token,
//! then `${KEY}` references resolved from a small set of derived variables
//! (sensitivity threshold, frame-rate limit, source/sink URLs, model paths)
//! and the request's additional-parameter map. Construction short-circuits
//! on the first error and tears down prior nodes in reverse order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Once;

use thiserror::Error;
use tracing::{info, warn};

use ea_core::{CreateInstanceRequest, DetectionSensitivity, NodeConfig, SolutionConfig};

use crate::models::{resolve_model_by_name, resolve_model_path};
use crate::node::{
    DestinationNode, InferenceNode, NodeKind, OsdNode, Pipeline, PipelineNode, SourceNode,
};
use crate::params::{clamp_resize_ratio, clamp_threshold, non_negative_or, parse_finite};

/// Default RTSP source when neither the request nor the environment names
/// one.
const DEFAULT_RTSP_URL: &str = "rtsp://localhost:8554/stream";

const DEFAULT_YUNET_MODEL: &str = "models/face/yunet.onnx";
const DEFAULT_SFACE_MODEL: &str = "models/face/face_recognition_sface_2021dec.onnx";

static BOOTSTRAP: Once = Once::new();

/// Pipeline construction errors.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("failed to construct {node}: {message}")]
    NodeConstruction { node: String, message: String },
}

impl From<BuildError> for ea_core::Error {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::InvalidParam(msg) => ea_core::Error::Validation(msg),
            other => ea_core::Error::Pipeline(other.to_string()),
        }
    }
}

/// One-time process bootstrap.
///
/// Configures the default RTSP transport to TCP unless the environment
/// already chose one (`GST_RTSP_PROTOCOLS`, or its alternative name
/// `RTSP_TRANSPORT`). TCP avoids UDP firewall trouble; callers who want UDP
/// set the variable before starting. `main` calls this explicitly so tests
/// can opt out.
pub fn bootstrap() {
    BOOTSTRAP.call_once(|| {
        if let Some(existing) = ea_core::env::gst_rtsp_protocols() {
            info!(transport = %existing, "using RTSP transport from environment");
            return;
        }
        let transport = match ea_core::env::rtsp_transport() {
            Some(t) => {
                let lower = t.to_ascii_lowercase();
                if lower == "tcp" || lower == "udp" {
                    lower
                } else {
                    "tcp".to_string()
                }
            }
            None => "tcp".to_string(),
        };
        std::env::set_var("GST_RTSP_PROTOCOLS", &transport);
        info!(transport = %transport, "defaulted RTSP transport");
    });
}

/// Build a pipeline from a solution template, a request, and an instance id.
///
/// Pure apart from [`bootstrap`]: the same inputs produce the same node
/// chain. Fails on the first node error; partially built nodes are detached
/// in reverse order before returning.
pub fn build_pipeline(
    solution: &SolutionConfig,
    req: &CreateInstanceRequest,
    instance_id: &str,
) -> Result<Pipeline, BuildError> {
    bootstrap();

    if solution.pipeline.is_empty() {
        return Err(BuildError::InvalidParam(format!(
            "solution {} has an empty pipeline",
            solution.solution_id
        )));
    }

    info!(
        solution = %solution.solution_id,
        instance = instance_id,
        nodes = solution.pipeline.len(),
        "building pipeline"
    );

    let mut nodes: Vec<Box<dyn PipelineNode>> = Vec::with_capacity(solution.pipeline.len());
    for node_config in &solution.pipeline {
        let mut node = match create_node(node_config, req, instance_id) {
            Ok(node) => node,
            Err(e) => {
                // Fatal for the whole pipeline: discard what was built, in
                // reverse order.
                for built in nodes.iter_mut().rev() {
                    built.detach();
                }
                return Err(e);
            }
        };
        if let Some(previous) = nodes.last() {
            let predecessor = previous.name().to_string();
            node.attach_to(&predecessor);
        }
        nodes.push(node);
    }

    Ok(Pipeline::from_nodes(nodes))
}

fn create_node(
    node_config: &NodeConfig,
    req: &CreateInstanceRequest,
    instance_id: &str,
) -> Result<Box<dyn PipelineNode>, BuildError> {
    let kind = NodeKind::from_tag(&node_config.node_type)
        .ok_or_else(|| BuildError::UnknownNodeType(node_config.node_type.clone()))?;

    let name = SolutionConfig::node_name(&node_config.node_name, instance_id);
    if name.is_empty() {
        return Err(BuildError::InvalidParam(format!(
            "{}: node name is empty",
            node_config.node_type
        )));
    }

    let params = effective_params(node_config, req, instance_id);

    let construction = |e: ea_core::Error| BuildError::NodeConstruction {
        node: name.clone(),
        message: e.to_string(),
    };

    let node: Box<dyn PipelineNode> = match kind {
        NodeKind::RtspSource => {
            let url = param_or(&params, "rtsp_url", || rtsp_url(req));
            Box::new(
                SourceNode::new(&name, kind, &url)
                    .map_err(construction)?
                    .with_channel(int_param(&params, "channel", 0)?)
                    .with_resize_ratio(resize_ratio(&params, req)?),
            )
        }
        NodeKind::FileSource => {
            let path = param_or(&params, "file_path", || file_path(req));
            Box::new(
                SourceNode::new(&name, kind, &path)
                    .map_err(construction)?
                    .with_channel(int_param(&params, "channel", 0)?)
                    .with_resize_ratio(resize_ratio(&params, req)?),
            )
        }
        NodeKind::AppSource => {
            let uri = param_or(&params, "uri", || format!("app://{instance_id}"));
            Box::new(SourceNode::new(&name, kind, &uri).map_err(construction)?)
        }
        NodeKind::RtmpSource => {
            let url = param_or(&params, "rtmp_url", || rtmp_url(req));
            Box::new(SourceNode::new(&name, kind, &url).map_err(construction)?)
        }
        NodeKind::FfmpegSource => {
            // FFmpeg handles HLS/HTTP streams the gstreamer sources cannot.
            let uri = param_or(&params, "uri", || {
                let file = file_path(req);
                if file.is_empty() {
                    rtsp_url(req)
                } else {
                    file
                }
            });
            Box::new(SourceNode::new(&name, kind, &uri).map_err(construction)?)
        }
        NodeKind::YunetFaceDetector => {
            let model = model_path_param(&params, req, DEFAULT_YUNET_MODEL);
            Box::new(
                InferenceNode::new(&name, kind, model)
                    .map_err(construction)?
                    .with_score_threshold(score_threshold(&params, req)?),
            )
        }
        NodeKind::YoloDetector => {
            let model = model_path_param(&params, req, DEFAULT_YUNET_MODEL);
            Box::new(
                InferenceNode::new(&name, kind, model)
                    .map_err(construction)?
                    .with_score_threshold(score_threshold(&params, req)?)
                    .with_nms_threshold(threshold_param(&params, "nms_threshold", 0.4)?),
            )
        }
        NodeKind::SfaceFeatureEncoder => {
            let model = sface_model_path(&params, req);
            Box::new(InferenceNode::new(&name, kind, model).map_err(construction)?)
        }
        NodeKind::FaceOsd | NodeKind::OsdV3 => {
            Box::new(OsdNode::new(&name, kind).map_err(construction)?)
        }
        NodeKind::FileDestination => {
            let target =
                param_or(&params, "file_path", || format!("./output/{instance_id}"));
            Box::new(
                DestinationNode::new(&name, kind, &target)
                    .map_err(construction)?,
            )
        }
        NodeKind::RtmpDestination => {
            let url = param_or(&params, "rtmp_url", || rtmp_url(req));
            Box::new(
                DestinationNode::new(&name, kind, &url)
                    .map_err(|e| BuildError::InvalidParam(e.to_string()))?
                    .with_bitrate(int_param(&params, "bitrate", 1024)?),
            )
        }
        NodeKind::AppDestination => {
            Box::new(DestinationNode::new(&name, kind, "").map_err(construction)?)
        }
    };

    Ok(node)
}

/// Build the effective parameter map: template params with `{instanceId}`
/// replaced, derived `${…}` variables resolved, and the model-path
/// overrides applied.
fn effective_params(
    node_config: &NodeConfig,
    req: &CreateInstanceRequest,
    instance_id: &str,
) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    for (key, raw) in &node_config.parameters {
        let value = raw.replace(ea_core::INSTANCE_ID_TOKEN, instance_id);
        let value = match (key.as_str(), value.as_str()) {
            ("score_threshold", "${detectionSensitivity}") => {
                DetectionSensitivity::parse(&req.detection_sensitivity).threshold().to_string()
            }
            (_, "${frameRateLimit}") => req.frame_rate_limit.to_string(),
            (_, "${RTSP_URL}") => rtsp_url(req),
            (_, "${FILE_PATH}") => file_path(req),
            (_, "${RTMP_URL}") => rtmp_url(req),
            ("model_path", "${MODEL_PATH}") => {
                resolve_model_param(req, "MODEL_NAME", "MODEL_PATH", DEFAULT_YUNET_MODEL)
                    .display()
                    .to_string()
            }
            ("model_path", "${SFACE_MODEL_PATH}") => {
                resolve_model_param(req, "SFACE_MODEL_NAME", "SFACE_MODEL_PATH", DEFAULT_SFACE_MODEL)
                    .display()
                    .to_string()
            }
            _ => ea_core::substitute(&value, &req.additional_params, instance_id),
        };
        params.insert(key.clone(), value);
    }

    // An explicit MODEL_NAME / MODEL_PATH in the request overrides a literal
    // model_path template value as well.
    if params.contains_key("model_path") {
        if let Some(explicit) = explicit_model_override(req) {
            params.insert("model_path".to_string(), explicit.display().to_string());
        }
    }

    params
}

/// Model selection priority: MODEL_NAME (optionally `category:` prefixed),
/// then the explicit MODEL_PATH parameter, then the default relative path.
fn resolve_model_param(
    req: &CreateInstanceRequest,
    name_key: &str,
    path_key: &str,
    default_relative: &str,
) -> PathBuf {
    if let Some(model_name) = req.additional_params.get(name_key).filter(|v| !v.is_empty()) {
        let (category, name) = match model_name.split_once(':') {
            Some((category, name)) => (category, name),
            None => ("face", model_name.as_str()),
        };
        if let Some(path) = resolve_model_by_name(name, category) {
            return path;
        }
        warn!(model = %model_name, "model name not found, falling back");
    }

    if let Some(explicit) = req.additional_params.get(path_key).filter(|v| !v.is_empty()) {
        return explicit_path_with_yunet_fallback(Path::new(explicit));
    }

    resolve_model_path(default_relative)
}

fn explicit_model_override(req: &CreateInstanceRequest) -> Option<PathBuf> {
    if let Some(model_name) = req.additional_params.get("MODEL_NAME").filter(|v| !v.is_empty()) {
        let (category, name) = match model_name.split_once(':') {
            Some((category, name)) => (category, name),
            None => ("face", model_name.as_str()),
        };
        if let Some(path) = resolve_model_by_name(name, category) {
            return Some(path);
        }
    }
    req.additional_params
        .get("MODEL_PATH")
        .filter(|v| !v.is_empty())
        .map(|p| explicit_path_with_yunet_fallback(Path::new(p)))
}

/// An explicit path is taken as-is when the file exists. A missing yunet
/// file falls back to a dated alternative in the same directory, with one
/// warning; anything else passes through unchanged and fails at runtime.
fn explicit_path_with_yunet_fallback(path: &Path) -> PathBuf {
    if path.is_file() {
        return path.to_path_buf();
    }
    if path.file_name().is_some_and(|n| n.to_string_lossy().contains("yunet")) {
        if let Some(dir) = path.parent() {
            for alternative in [
                "face_detection_yunet_2023mar.onnx",
                "face_detection_yunet_2022mar.onnx",
                "yunet_2023mar.onnx",
                "yunet_2022mar.onnx",
            ] {
                let candidate = dir.join(alternative);
                if candidate.is_file() {
                    warn!(
                        requested = %path.display(),
                        selected = %candidate.display(),
                        "requested yunet model missing, using alternative"
                    );
                    return candidate;
                }
            }
        }
    }
    path.to_path_buf()
}

fn model_path_param(
    params: &BTreeMap<String, String>,
    req: &CreateInstanceRequest,
    default_relative: &str,
) -> PathBuf {
    match params.get("model_path").filter(|v| !v.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => resolve_model_param(req, "MODEL_NAME", "MODEL_PATH", default_relative),
    }
}

fn sface_model_path(params: &BTreeMap<String, String>, req: &CreateInstanceRequest) -> PathBuf {
    match params.get("model_path").filter(|v| !v.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => resolve_model_param(req, "SFACE_MODEL_NAME", "SFACE_MODEL_PATH", DEFAULT_SFACE_MODEL),
    }
}

fn param_or(
    params: &BTreeMap<String, String>,
    key: &str,
    fallback: impl FnOnce() -> String,
) -> String {
    match params.get(key).filter(|v| !v.is_empty()) {
        Some(value) => value.clone(),
        None => fallback(),
    }
}

fn int_param(params: &BTreeMap<String, String>, key: &str, default: i64) -> Result<i64, BuildError> {
    match params.get(key).filter(|v| !v.is_empty()) {
        Some(value) => {
            let parsed = value.parse::<i64>().map_err(|_| {
                BuildError::InvalidParam(format!("{key}: not an integer: {value:?}"))
            })?;
            Ok(non_negative_or(key, parsed, default))
        }
        None => Ok(default),
    }
}

fn threshold_param(
    params: &BTreeMap<String, String>,
    key: &str,
    default: f64,
) -> Result<f64, BuildError> {
    match params.get(key).filter(|v| !v.is_empty()) {
        Some(value) => Ok(clamp_threshold(key, parse_finite(key, value)?)),
        None => Ok(default),
    }
}

fn score_threshold(
    params: &BTreeMap<String, String>,
    req: &CreateInstanceRequest,
) -> Result<f64, BuildError> {
    let default = DetectionSensitivity::parse(&req.detection_sensitivity).threshold();
    threshold_param(params, "score_threshold", default)
}

/// Resize ratio priority: request RESIZE_RATIO override, then the template
/// parameter, then 0.25.
fn resize_ratio(
    params: &BTreeMap<String, String>,
    req: &CreateInstanceRequest,
) -> Result<f64, BuildError> {
    if let Some(value) = req.additional_params.get("RESIZE_RATIO").filter(|v| !v.is_empty()) {
        return Ok(clamp_resize_ratio(parse_finite("RESIZE_RATIO", value)?));
    }
    match params.get("resize_ratio").filter(|v| !v.is_empty()) {
        Some(value) => Ok(clamp_resize_ratio(parse_finite("resize_ratio", value)?)),
        None => Ok(0.25),
    }
}

fn rtsp_url(req: &CreateInstanceRequest) -> String {
    if let Some(url) = req.additional_params.get("RTSP_URL").filter(|v| !v.is_empty()) {
        return url.clone();
    }
    if let Some(url) = ea_core::env::rtsp_url() {
        return url;
    }
    warn!(default = DEFAULT_RTSP_URL, "no RTSP URL in request or environment, using default");
    DEFAULT_RTSP_URL.to_string()
}

fn rtmp_url(req: &CreateInstanceRequest) -> String {
    req.additional_params.get("RTMP_URL").cloned().unwrap_or_default()
}

fn file_path(req: &CreateInstanceRequest) -> String {
    req.additional_params.get("FILE_PATH").cloned().unwrap_or_default()
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
