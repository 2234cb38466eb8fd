// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Fabstir Embedding Node

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Capabilities of this build
pub const FEATURES: &[&str] = &[
    "onnx-embeddings",
    "cuda-cpu-fallback",
    "prometheus-metrics",
    "json-access-log",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Fabstir Embedding Node {}", VERSION_NUMBER)
}

/// Comma separated [`FEATURES`] for the startup banner
pub fn get_features_string() -> String {
    FEATURES.join(", ")
}
