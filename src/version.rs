// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the embedding service

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-bge-m3-onnx";

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "batch-embed",
    "health-check",
    "onnx-runtime",
    "cuda-fallback-cpu",
    "hf-hub-download",
    "cls-pooling",
    "mean-pooling",
    "graceful-shutdown",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("embed-service {} ({})", VERSION_NUMBER, VERSION)
}
