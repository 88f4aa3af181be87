// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding backends
//!
//! The HTTP layer only talks to [`TextEmbedder`]. The production backend is
//! [`OnnxEmbeddingModel`]; [`DeterministicEmbedder`] stands in for it in tests
//! and benchmarks.

pub mod deterministic;
pub mod model_loader;
pub mod onnx_model;
pub mod pooling;

pub use deterministic::DeterministicEmbedder;
pub use model_loader::{load_model, resolve_model_files, EmbeddingModelConfig, ModelFiles};
pub use onnx_model::OnnxEmbeddingModel;
pub use pooling::{l2_normalize, Pooling};

use anyhow::Result;
use async_trait::async_trait;

/// Model identifier served when nothing else is configured
pub const DEFAULT_MODEL_ID: &str = "BAAI/bge-m3";

/// Output dimension of [`DEFAULT_MODEL_ID`]
pub const DEFAULT_DIMENSION: usize = 1024;

/// A loaded sentence-embedding model.
///
/// Implementations are immutable once constructed and shared between
/// request handlers through `Arc<dyn TextEmbedder>`.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Identifier of the loaded model (e.g. "BAAI/bge-m3")
    fn model_id(&self) -> &str;

    /// Length of every vector this model produces
    fn dimension(&self) -> usize;

    /// Embeds `texts`, returning exactly one vector per input in input order.
    ///
    /// When `normalize` is false the raw pooled vectors are returned.
    async fn embed_batch(&self, texts: Vec<String>, normalize: bool) -> Result<Vec<Vec<f32>>>;
}
