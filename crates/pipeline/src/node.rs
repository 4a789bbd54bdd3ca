// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node handles and the pipeline that owns them.
//!
//! Nodes carry their validated config and expose only lifecycle methods and
//! parameter mutation; the SDK internals behind them are out of scope. The
//! pipeline owns its nodes as a flat vector with name-based attachment —
//! no back-pointers from a node to its owner, so teardown is a reverse walk.

use std::path::PathBuf;

use tracing::{debug, warn};

use ea_core::Error;

use crate::params::{clamp_resize_ratio, clamp_threshold, parse_finite};

/// Node type tag. The string tags are the template vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    RtspSource,
    FileSource,
    AppSource,
    RtmpSource,
    FfmpegSource,
    YunetFaceDetector,
    YoloDetector,
    SfaceFeatureEncoder,
    FaceOsd,
    OsdV3,
    FileDestination,
    RtmpDestination,
    AppDestination,
}

impl NodeKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "rtsp_src" => NodeKind::RtspSource,
            "file_src" => NodeKind::FileSource,
            "app_src" => NodeKind::AppSource,
            "rtmp_src" => NodeKind::RtmpSource,
            "ffmpeg_src" => NodeKind::FfmpegSource,
            "yunet_face_detector" => NodeKind::YunetFaceDetector,
            "yolo_detector" => NodeKind::YoloDetector,
            "sface_feature_encoder" => NodeKind::SfaceFeatureEncoder,
            "face_osd_v2" => NodeKind::FaceOsd,
            "osd_v3" => NodeKind::OsdV3,
            "file_des" => NodeKind::FileDestination,
            "rtmp_des" => NodeKind::RtmpDestination,
            "app_des" => NodeKind::AppDestination,
            _ => return None,
        })
    }

    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::RtspSource => "rtsp_src",
            NodeKind::FileSource => "file_src",
            NodeKind::AppSource => "app_src",
            NodeKind::RtmpSource => "rtmp_src",
            NodeKind::FfmpegSource => "ffmpeg_src",
            NodeKind::YunetFaceDetector => "yunet_face_detector",
            NodeKind::YoloDetector => "yolo_detector",
            NodeKind::SfaceFeatureEncoder => "sface_feature_encoder",
            NodeKind::FaceOsd => "face_osd_v2",
            NodeKind::OsdV3 => "osd_v3",
            NodeKind::FileDestination => "file_des",
            NodeKind::RtmpDestination => "rtmp_des",
            NodeKind::AppDestination => "app_des",
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(
            self,
            NodeKind::RtspSource
                | NodeKind::FileSource
                | NodeKind::AppSource
                | NodeKind::RtmpSource
                | NodeKind::FfmpegSource
        )
    }
}

/// An opaque processing unit: lifecycle plus parameter mutation.
pub trait PipelineNode: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> NodeKind;

    /// Begin producing/consuming. Only source nodes do real work on start;
    /// downstream nodes are driven by attachment.
    fn start(&mut self) -> Result<(), Error>;

    /// Detach from the graph and stop.
    fn detach(&mut self);

    fn is_running(&self) -> bool;

    /// Mutate one parameter in place. Returns true when the node recognized
    /// and applied the key.
    fn set_param(&mut self, key: &str, value: &str) -> bool;

    /// Read back one parameter, for status reporting and update diffing.
    fn get_param(&self, key: &str) -> Option<String>;

    fn attached_to(&self) -> Option<&str>;
    fn attach_to(&mut self, predecessor: &str);

    /// Consecutive failures reported by this node. Only sources track
    /// failures; everything else reports zero.
    fn failures(&self) -> u32 {
        0
    }

    /// Record one failure (stream drop, decode error). No-op for
    /// non-source nodes.
    fn record_failure(&mut self) {}
}

/// Source node: RTSP/RTMP/file/app/ffmpeg input.
pub struct SourceNode {
    name: String,
    kind: NodeKind,
    uri: String,
    channel: i64,
    resize_ratio: f64,
    frame_rate_limit: i64,
    running: bool,
    attached_to: Option<String>,
    failures: u32,
}

impl SourceNode {
    pub fn new(name: &str, kind: NodeKind, uri: &str) -> Result<Self, Error> {
        if name.is_empty() {
            return Err(Error::validation("source node name cannot be empty"));
        }
        if uri.is_empty() {
            return Err(Error::validation(format!("{}: source URI is required", kind.tag())));
        }
        Ok(SourceNode {
            name: name.to_string(),
            kind,
            uri: uri.to_string(),
            channel: 0,
            resize_ratio: 1.0,
            frame_rate_limit: 0,
            running: false,
            attached_to: None,
            failures: 0,
        })
    }

    pub fn with_channel(mut self, channel: i64) -> Self {
        self.channel = crate::params::non_negative_or("channel", channel, 0);
        self
    }

    pub fn with_resize_ratio(mut self, ratio: f64) -> Self {
        self.resize_ratio = clamp_resize_ratio(ratio);
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn resize_ratio(&self) -> f64 {
        self.resize_ratio
    }
}

impl PipelineNode for SourceNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn start(&mut self) -> Result<(), Error> {
        debug!(node = %self.name, uri = %self.uri, "starting source");
        self.running = true;
        Ok(())
    }

    fn detach(&mut self) {
        self.running = false;
        self.attached_to = None;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn set_param(&mut self, key: &str, value: &str) -> bool {
        match key {
            "resize_ratio" => match parse_finite(key, value) {
                Ok(v) => {
                    self.resize_ratio = clamp_resize_ratio(v);
                    true
                }
                Err(e) => {
                    warn!(node = %self.name, error = %e, "ignoring bad resize_ratio");
                    false
                }
            },
            "frame_rate_limit" => match value.parse::<i64>() {
                Ok(v) => {
                    self.frame_rate_limit = crate::params::non_negative_or(key, v, 0);
                    true
                }
                Err(_) => false,
            },
            _ => false,
        }
    }

    fn get_param(&self, key: &str) -> Option<String> {
        match key {
            "uri" => Some(self.uri.clone()),
            "channel" => Some(self.channel.to_string()),
            "resize_ratio" => Some(self.resize_ratio.to_string()),
            "frame_rate_limit" => Some(self.frame_rate_limit.to_string()),
            _ => None,
        }
    }

    fn attached_to(&self) -> Option<&str> {
        self.attached_to.as_deref()
    }

    fn attach_to(&mut self, predecessor: &str) {
        self.attached_to = Some(predecessor.to_string());
    }

    fn failures(&self) -> u32 {
        self.failures
    }

    fn record_failure(&mut self) {
        self.failures += 1;
    }
}

/// Inference node: detector or feature encoder with a model file.
pub struct InferenceNode {
    name: String,
    kind: NodeKind,
    model_path: PathBuf,
    score_threshold: f64,
    nms_threshold: f64,
    running: bool,
    attached_to: Option<String>,
}

impl InferenceNode {
    pub fn new(name: &str, kind: NodeKind, model_path: PathBuf) -> Result<Self, Error> {
        if name.is_empty() {
            return Err(Error::validation("inference node name cannot be empty"));
        }
        if model_path.as_os_str().is_empty() {
            return Err(Error::Pipeline(format!("{}: model path is required", kind.tag())));
        }
        Ok(InferenceNode {
            name: name.to_string(),
            kind,
            model_path,
            score_threshold: 0.7,
            nms_threshold: 0.4,
            running: false,
            attached_to: None,
        })
    }

    pub fn with_score_threshold(mut self, threshold: f64) -> Self {
        self.score_threshold = clamp_threshold("score_threshold", threshold);
        self
    }

    pub fn with_nms_threshold(mut self, threshold: f64) -> Self {
        self.nms_threshold = clamp_threshold("nms_threshold", threshold);
        self
    }

    pub fn model_path(&self) -> &PathBuf {
        &self.model_path
    }

    pub fn score_threshold(&self) -> f64 {
        self.score_threshold
    }
}

impl PipelineNode for InferenceNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn start(&mut self) -> Result<(), Error> {
        self.running = true;
        Ok(())
    }

    fn detach(&mut self) {
        self.running = false;
        self.attached_to = None;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn set_param(&mut self, key: &str, value: &str) -> bool {
        match key {
            "score_threshold" | "nms_threshold" => match parse_finite(key, value) {
                Ok(v) => {
                    let clamped = clamp_threshold(key, v);
                    if key == "score_threshold" {
                        self.score_threshold = clamped;
                    } else {
                        self.nms_threshold = clamped;
                    }
                    true
                }
                Err(e) => {
                    warn!(node = %self.name, error = %e, "ignoring bad threshold");
                    false
                }
            },
            _ => false,
        }
    }

    fn get_param(&self, key: &str) -> Option<String> {
        match key {
            "model_path" => Some(self.model_path.display().to_string()),
            "score_threshold" => Some(self.score_threshold.to_string()),
            "nms_threshold" => Some(self.nms_threshold.to_string()),
            _ => None,
        }
    }

    fn attached_to(&self) -> Option<&str> {
        self.attached_to.as_deref()
    }

    fn attach_to(&mut self, predecessor: &str) {
        self.attached_to = Some(predecessor.to_string());
    }
}

/// On-screen-display overlay node.
pub struct OsdNode {
    name: String,
    kind: NodeKind,
    font_path: Option<String>,
    show_labels: bool,
    running: bool,
    attached_to: Option<String>,
}

impl OsdNode {
    pub fn new(name: &str, kind: NodeKind) -> Result<Self, Error> {
        if name.is_empty() {
            return Err(Error::validation("osd node name cannot be empty"));
        }
        // Unset env means the built-in font; explicitly empty disables the
        // font requirement.
        let font_path = match ea_core::env::osd_font_path() {
            None => Some("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()),
            Some(path) if path.is_empty() => None,
            Some(path) => Some(path),
        };
        Ok(OsdNode {
            name: name.to_string(),
            kind,
            font_path,
            show_labels: true,
            running: false,
            attached_to: None,
        })
    }

    pub fn font_path(&self) -> Option<&str> {
        self.font_path.as_deref()
    }
}

impl PipelineNode for OsdNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn start(&mut self) -> Result<(), Error> {
        self.running = true;
        Ok(())
    }

    fn detach(&mut self) {
        self.running = false;
        self.attached_to = None;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn set_param(&mut self, key: &str, value: &str) -> bool {
        match key {
            "show_labels" | "osd_enabled" => {
                self.show_labels = value == "true" || value == "1";
                true
            }
            _ => false,
        }
    }

    fn get_param(&self, key: &str) -> Option<String> {
        match key {
            "show_labels" => Some(self.show_labels.to_string()),
            "font_path" => self.font_path.clone(),
            _ => None,
        }
    }

    fn attached_to(&self) -> Option<&str> {
        self.attached_to.as_deref()
    }

    fn attach_to(&mut self, predecessor: &str) {
        self.attached_to = Some(predecessor.to_string());
    }
}

/// Destination node: file, RTMP, or app sink.
pub struct DestinationNode {
    name: String,
    kind: NodeKind,
    target: String,
    bitrate: i64,
    running: bool,
    attached_to: Option<String>,
}

impl DestinationNode {
    pub fn new(name: &str, kind: NodeKind, target: &str) -> Result<Self, Error> {
        if name.is_empty() {
            return Err(Error::validation("destination node name cannot be empty"));
        }
        if kind == NodeKind::RtmpDestination && target.is_empty() {
            return Err(Error::validation("rtmp_des: RTMP URL is required"));
        }
        Ok(DestinationNode {
            name: name.to_string(),
            kind,
            target: target.to_string(),
            bitrate: 1024,
            running: false,
            attached_to: None,
        })
    }

    pub fn with_bitrate(mut self, bitrate: i64) -> Self {
        self.bitrate = crate::params::non_negative_or("bitrate", bitrate, 1024);
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl PipelineNode for DestinationNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn start(&mut self) -> Result<(), Error> {
        self.running = true;
        Ok(())
    }

    fn detach(&mut self) {
        self.running = false;
        self.attached_to = None;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn set_param(&mut self, key: &str, value: &str) -> bool {
        match key {
            "bitrate" => match value.parse::<i64>() {
                Ok(v) => {
                    self.bitrate = crate::params::non_negative_or(key, v, 1024);
                    true
                }
                Err(_) => false,
            },
            _ => false,
        }
    }

    fn get_param(&self, key: &str) -> Option<String> {
        match key {
            "target" => Some(self.target.clone()),
            "bitrate" => Some(self.bitrate.to_string()),
            _ => None,
        }
    }

    fn attached_to(&self) -> Option<&str> {
        self.attached_to.as_deref()
    }

    fn attach_to(&mut self, predecessor: &str) {
        self.attached_to = Some(predecessor.to_string());
    }
}

/// The concrete, attached chain of nodes for one instance.
///
/// Non-empty and ordered; node N is attached to node N-1. Owned by exactly
/// one instance, lifetime bounded by that instance's loaded window.
pub struct Pipeline {
    nodes: Vec<Box<dyn PipelineNode>>,
    running: bool,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("nodes", &self.nodes.iter().map(|n| n.name()).collect::<Vec<_>>())
            .field("running", &self.running)
            .finish()
    }
}

impl Pipeline {
    pub(crate) fn from_nodes(nodes: Vec<Box<dyn PipelineNode>>) -> Self {
        Pipeline { nodes, running: false }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name()).collect()
    }

    pub fn node_kinds(&self) -> Vec<NodeKind> {
        self.nodes.iter().map(|n| n.kind()).collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &dyn PipelineNode> {
        self.nodes.iter().map(|n| n.as_ref())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start the pipeline by starting its source node; downstream nodes are
    /// driven by attachment.
    pub fn start(&mut self) -> Result<(), Error> {
        let Some(source) = self.nodes.first_mut() else {
            return Err(Error::Pipeline("cannot start an empty pipeline".into()));
        };
        source.start()?;
        self.running = true;
        Ok(())
    }

    /// Stop and detach every node, sink first.
    pub fn stop(&mut self) {
        for node in self.nodes.iter_mut().rev() {
            node.detach();
        }
        self.running = false;
    }

    /// Apply one parameter to every node that recognizes it. Returns how
    /// many nodes applied it.
    pub fn set_param(&mut self, key: &str, value: &str) -> usize {
        let mut count = 0;
        for node in self.nodes.iter_mut() {
            if node.set_param(key, value) {
                count += 1;
            }
        }
        count
    }

    /// Read one parameter from the first node that recognizes it.
    pub fn get_param(&self, key: &str) -> Option<String> {
        self.nodes.iter().find_map(|n| n.get_param(key))
    }

    /// Consecutive failure count reported by the source node.
    pub fn source_failures(&self) -> u32 {
        self.nodes.first().map_or(0, |n| n.failures())
    }

    /// Record one failure against the source node.
    pub fn record_source_failure(&mut self) {
        if let Some(source) = self.nodes.first_mut() {
            source.record_failure();
        }
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
