// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Solution templates: declarative pipeline definitions with placeholders.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Literal token substituted with the owning instance id in node names and
/// parameter values.
pub const INSTANCE_ID_TOKEN: &str = "{instanceId}";

/// One node descriptor inside a solution template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeConfig {
    /// Node type tag, e.g. "rtsp_src", "yunet_face_detector", "file_des".
    pub node_type: String,
    /// Name template; contains `{instanceId}`.
    pub node_name: String,
    /// Parameter map; values may reference `{instanceId}` or `${KEY}`.
    pub parameters: BTreeMap<String, String>,
}

/// A reusable pipeline template. Built-ins are marked `is_default` and live
/// only in code; anything loaded from storage has the flag forced off.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolutionConfig {
    pub solution_id: String,
    pub solution_name: String,
    pub solution_type: String,
    pub is_default: bool,
    pub pipeline: Vec<NodeConfig>,
    pub defaults: BTreeMap<String, String>,
}

impl SolutionConfig {
    /// Substitute every `{instanceId}` occurrence in a name template.
    pub fn node_name(template: &str, instance_id: &str) -> String {
        template.replace(INSTANCE_ID_TOKEN, instance_id)
    }

    /// Resolve a parameter by key: solution defaults first, then request
    /// params, then the empty string. `{instanceId}` and `${KEY}` references
    /// are substituted from the instance id and the request params.
    pub fn resolve_parameter(
        &self,
        key: &str,
        request_params: &BTreeMap<String, String>,
        instance_id: &str,
    ) -> String {
        let raw = self
            .defaults
            .get(key)
            .or_else(|| request_params.get(key))
            .cloned()
            .unwrap_or_default();
        substitute(&raw, request_params, instance_id)
    }
}

/// Substitute `{instanceId}` and every `${KEY}` reference in a template
/// value. Unresolved references become the empty string.
pub fn substitute(
    value: &str,
    request_params: &BTreeMap<String, String>,
    instance_id: &str,
) -> String {
    let mut out = value.replace(INSTANCE_ID_TOKEN, instance_id);
    while let Some(start) = out.find("${") {
        let Some(rel_end) = out[start..].find('}') else { break };
        let end = start + rel_end;
        let key = out[start + 2..end].to_string();
        let replacement = request_params.get(&key).cloned().unwrap_or_default();
        out.replace_range(start..=end, &replacement);
    }
    out
}

#[cfg(test)]
#[path = "solution_tests.rs"]
mod tests;
