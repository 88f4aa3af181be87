// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod embeddings;
pub mod version;

pub use api::{create_app, ApiConfig, AppState, EmbedRequest, EmbedResponse, HealthResponse};
pub use config::{ConfigError, ServiceConfig};
pub use embeddings::{DeterministicEmbedder, OnnxEmbeddingModel, Pooling, TextEmbedder};
