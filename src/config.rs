// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Service configuration
//!
//! Every setting is a CLI flag with an environment variable fallback.
//! `main` loads a `.env` file first, so the same variables may live there.

use crate::api::ApiConfig;
use crate::embeddings::{
    onnx_model::{OnnxModelOptions, DEFAULT_BATCH_SIZE},
    EmbeddingModelConfig, Pooling, DEFAULT_DIMENSION, DEFAULT_MODEL_ID,
};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than 0")]
    Zero { field: &'static str },

    #[error("model id cannot be empty")]
    EmptyModelId,

    #[error("--model-path and --tokenizer-path must be set together")]
    PartialModelPaths,

    #[error("invalid listen address {0}")]
    InvalidAddress(String),
}

/// Embedding service settings
#[derive(Parser, Debug, Clone)]
#[command(name = "embed-service")]
#[command(version)]
#[command(about = "Serve batch text embeddings over HTTP", long_about = None)]
pub struct ServiceConfig {
    /// IP address to bind
    #[arg(long, env = "EMBED_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind
    #[arg(long, env = "EMBED_PORT", default_value_t = 8081)]
    pub port: u16,

    /// HuggingFace hub identifier of the embedding model
    #[arg(long, env = "EMBED_MODEL_ID", default_value = DEFAULT_MODEL_ID)]
    pub model_id: String,

    /// Local ONNX model file (skips the hub download; requires --tokenizer-path)
    #[arg(long, env = "EMBED_MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Local tokenizer.json (requires --model-path)
    #[arg(long, env = "EMBED_TOKENIZER_PATH")]
    pub tokenizer_path: Option<PathBuf>,

    /// Expected vector dimension; startup fails if the model disagrees
    #[arg(long, env = "EMBED_DIMENSION", default_value_t = DEFAULT_DIMENSION)]
    pub dimension: usize,

    /// Sentence pooling strategy (cls or mean)
    #[arg(long, env = "EMBED_POOLING", default_value = "cls")]
    pub pooling: Pooling,

    /// Maximum tokens per text; longer texts are truncated
    #[arg(long, env = "EMBED_MAX_LENGTH", default_value_t = 8192)]
    pub max_length: usize,

    /// ONNX Runtime intra-op threads
    #[arg(long, env = "EMBED_INTRA_THREADS", default_value_t = 4)]
    pub intra_threads: usize,

    /// Texts per inference call; larger requests run in several sub-batches
    #[arg(long, env = "EMBED_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Maximum accepted request body size in bytes
    #[arg(long, env = "EMBED_MAX_BODY_BYTES", default_value_t = 32 * 1024 * 1024)]
    pub max_body_bytes: usize,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model_id.trim().is_empty() {
            return Err(ConfigError::EmptyModelId);
        }
        if self.model_path.is_some() != self.tokenizer_path.is_some() {
            return Err(ConfigError::PartialModelPaths);
        }

        for (field, value) in [
            ("dimension", self.dimension),
            ("max_length", self.max_length),
            ("intra_threads", self.intra_threads),
            ("batch_size", self.batch_size),
            ("max_body_bytes", self.max_body_bytes),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }

        self.listen_addr()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::InvalidAddress(addr))
    }

    pub fn api_config(&self) -> Result<ApiConfig, ConfigError> {
        Ok(ApiConfig {
            listen_addr: self.listen_addr()?,
            max_body_bytes: self.max_body_bytes,
        })
    }

    pub fn model_config(&self) -> EmbeddingModelConfig {
        EmbeddingModelConfig {
            model_id: self.model_id.clone(),
            model_path: self.model_path.clone(),
            tokenizer_path: self.tokenizer_path.clone(),
            options: OnnxModelOptions {
                dimension: self.dimension,
                max_length: self.max_length,
                pooling: self.pooling,
                intra_threads: self.intra_threads,
                batch_size: self.batch_size,
            },
        }
    }
}
