// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Model file resolution.
//!
//! Two strategies, tried by the builder in order: by explicit relative path
//! and by model name with pattern/extension expansion. Both walk the same
//! ordered location list: `CVEDIX_DATA_ROOT`, `CVEDIX_SDK_ROOT/cvedix_data`,
//! the working directory, system data directories (`/usr/share` preferred
//! over `/usr/include`), then SDK source checkouts.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Extensions a model file may carry, in preference order.
const MODEL_EXTENSIONS: &[&str] =
    &[".onnx", ".rknn", ".weights", ".pt", ".pth", ".pb", ".tflite"];

/// Alternative yunet file names, newest first. Data packs frequently ship a
/// dated file instead of the bare `yunet.onnx` the templates ask for.
const YUNET_ALTERNATIVES: &[&str] = &[
    "face_detection_yunet_2023mar.onnx",
    "face_detection_yunet_2022mar.onnx",
    "yunet_2023mar.onnx",
    "yunet_2022mar.onnx",
];

/// System-wide data locations. FHS puts data under share/; the include/
/// variants exist for SDK installs that dump everything under headers.
const SYSTEM_DATA_DIRS: &[&str] = &[
    "/usr/share/cvedix/cvedix_data",
    "/usr/local/share/cvedix/cvedix_data",
    "/usr/include/cvedix/cvedix_data",
    "/usr/local/include/cvedix/cvedix_data",
];

/// SDK source checkout locations, relative to the working directory.
const SDK_SOURCE_DIRS: &[&str] = &["../edge_ai_sdk/cvedix_data", "../../edge_ai_sdk/cvedix_data"];

/// Ordered list of data roots to search.
fn data_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(root) = ea_core::env::data_root() {
        roots.push(root);
    }
    if let Some(root) = ea_core::env::sdk_root() {
        roots.push(root.join("cvedix_data"));
    }
    roots.push(PathBuf::from("./cvedix_data"));
    roots.extend(SYSTEM_DATA_DIRS.iter().map(PathBuf::from));
    roots.extend(SDK_SOURCE_DIRS.iter().map(PathBuf::from));
    roots
}

/// Resolve a model file by relative path (e.g. `models/face/yunet.onnx`).
///
/// The first existing file wins. For a yunet request whose exact file is
/// missing, a dated alternative in the same directory is selected (one
/// warning). When nothing exists the default relative path is returned and
/// the node fails later at runtime, not here.
pub fn resolve_model_path(relative: &str) -> PathBuf {
    for root in data_roots() {
        let candidate = root.join(relative);
        if candidate.is_file() {
            info!(path = %candidate.display(), "resolved model path");
            return candidate;
        }
        if relative.contains("yunet.onnx") {
            if let Some(alternative) = find_yunet_alternative(&candidate) {
                warn!(
                    requested = relative,
                    selected = %alternative.display(),
                    "requested yunet model missing, using alternative"
                );
                return alternative;
            }
        }
    }

    let fallback = PathBuf::from("./cvedix_data").join(relative);
    warn!(path = %fallback.display(), "model not found in any known location, using default path");
    fallback
}

fn find_yunet_alternative(requested: &Path) -> Option<PathBuf> {
    let dir = requested.parent()?;
    if !dir.is_dir() {
        return None;
    }
    YUNET_ALTERNATIVES
        .iter()
        .map(|alt| dir.join(alt))
        .find(|candidate| candidate.is_file())
}

/// Candidate filename stems for a model name. Face-ish names additionally
/// try the conventional `face_detection_` prefixes.
fn name_patterns(model_name: &str) -> Vec<String> {
    let mut patterns = vec![model_name.to_string()];
    if model_name.contains("yunet") || model_name.contains("face") {
        patterns.push(format!("face_detection_{model_name}"));
        patterns.push(format!("{model_name}_face_detection"));
        if !model_name.contains("yunet") {
            patterns.push(format!("face_detection_yunet_{model_name}"));
        }
    }
    patterns
}

fn category_dirs(category: &str) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> =
        data_roots().into_iter().map(|root| root.join("models").join(category)).collect();
    dirs.push(PathBuf::from("./models"));
    dirs
}

/// Resolve a model by name (e.g. `yunet_2023mar`, `face:yolov8n_face`).
///
/// An exact filename match beats a case-insensitive contains match; both
/// are tried per pattern and extension across the ordered locations.
pub fn resolve_model_by_name(model_name: &str, category: &str) -> Option<PathBuf> {
    let patterns = name_patterns(model_name);

    for dir in category_dirs(category) {
        if !dir.is_dir() {
            continue;
        }
        for pattern in &patterns {
            for ext in MODEL_EXTENSIONS {
                let exact = dir.join(format!("{pattern}{ext}"));
                if exact.is_file() {
                    info!(model = model_name, path = %exact.display(), "resolved model by name");
                    return Some(exact);
                }
            }
        }
        // Case-insensitive contains, only after every exact candidate in
        // this directory missed.
        if let Some(found) = contains_match(&dir, &patterns) {
            info!(model = model_name, path = %found.display(), "resolved model by fuzzy name");
            return Some(found);
        }
    }
    None
}

fn contains_match(dir: &Path, patterns: &[String]) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut files: Vec<PathBuf> =
        entries.flatten().map(|e| e.path()).filter(|p| p.is_file()).collect();
    files.sort();
    for path in files {
        let file_name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
        for pattern in patterns {
            for ext in MODEL_EXTENSIONS {
                let needle = format!("{pattern}{ext}").to_ascii_lowercase();
                if file_name == needle || file_name.contains(&needle) {
                    return Some(path);
                }
            }
        }
    }
    None
}

/// Enumerate model files across every known location, deduplicated. An
/// empty category lists the whole models tree root.
pub fn list_available_models(category: &str) -> Vec<PathBuf> {
    let dirs: Vec<PathBuf> = if category.is_empty() {
        let mut dirs: Vec<PathBuf> =
            data_roots().into_iter().map(|root| root.join("models")).collect();
        dirs.push(PathBuf::from("./models"));
        dirs
    } else {
        category_dirs(category)
    };

    let mut models = BTreeSet::new();
    for dir in dirs {
        let Ok(entries) = std::fs::read_dir(&dir) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            if MODEL_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
                models.insert(path.canonicalize().unwrap_or(path));
            }
        }
    }
    models.into_iter().collect()
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
