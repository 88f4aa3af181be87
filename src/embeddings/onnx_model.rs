// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX Embedding Model Wrapper
//!
//! This module provides a wrapper around ONNX Runtime for running
//! sentence transformer models exported to ONNX (BAAI/bge-m3 by default).
//!
//! Features:
//! - ONNX model loading from disk
//! - GPU acceleration via CUDA (with automatic CPU fallback)
//! - HuggingFace tokenization with truncation and batch padding
//! - CLS or mean pooling over token embeddings
//! - Output dimension validated at load time
//! - Inference on the blocking thread pool

use super::pooling::{l2_normalize, Pooling};
use super::TextEmbedder;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ndarray::{Array2, ArrayViewD, Axis, Ix2};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionInputValue};
use ort::value::Value;
use std::borrow::Cow;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info, warn};

/// Input text used for the load-time dimension probe
const PROBE_TEXT: &str = "validation test";

/// Sub-batch size used when none is configured
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Loading options for [`OnnxEmbeddingModel`]
#[derive(Debug, Clone)]
pub struct OnnxModelOptions {
    /// Expected output dimension (1024 for bge-m3)
    pub dimension: usize,
    /// Maximum tokens per text; longer texts are truncated
    pub max_length: usize,
    pub pooling: Pooling,
    /// ONNX Runtime intra-op thread count
    pub intra_threads: usize,
    /// Texts per inference call; each sub-batch is padded on its own
    pub batch_size: usize,
}

impl Default for OnnxModelOptions {
    fn default() -> Self {
        Self {
            dimension: super::DEFAULT_DIMENSION,
            max_length: 8192,
            pooling: Pooling::Cls,
            intra_threads: 4,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// ONNX-based sentence embedding model
///
/// # Thread Safety
/// Cloning is cheap: the session and tokenizer sit behind `Arc`. The session
/// needs exclusive access to run, so it is guarded by a mutex that is held
/// for exactly one batch.
#[derive(Clone)]
pub struct OnnxEmbeddingModel {
    session: Arc<Mutex<Session>>,

    tokenizer: Arc<Tokenizer>,

    /// Model identifier (e.g., "BAAI/bge-m3")
    model_name: String,

    dimension: usize,

    max_length: usize,

    pooling: Pooling,

    batch_size: usize,

    /// Whether the graph declares a `token_type_ids` input.
    /// BERT exports do, XLM-RoBERTa exports (bge-m3) don't.
    uses_token_type_ids: bool,

    pad_id: u32,
}

impl std::fmt::Debug for OnnxEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingModel")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("max_length", &self.max_length)
            .field("pooling", &self.pooling)
            .field("batch_size", &self.batch_size)
            .field("uses_token_type_ids", &self.uses_token_type_ids)
            .finish_non_exhaustive()
    }
}

impl OnnxEmbeddingModel {
    /// Loads an ONNX embedding model and its tokenizer from disk.
    ///
    /// This is blocking (session creation plus a probe inference) and should
    /// run on a blocking thread when called from async code.
    ///
    /// # Errors
    /// Returns error if:
    /// - Model or tokenizer file not found or invalid
    /// - ONNX Runtime initialization fails
    /// - The probe inference does not produce `options.dimension` values
    ///
    /// # Example
    /// ```ignore
    /// let model = OnnxEmbeddingModel::new(
    ///     "BAAI/bge-m3",
    ///     "/models/bge-m3/onnx/model.onnx",
    ///     "/models/bge-m3/tokenizer.json",
    ///     OnnxModelOptions::default(),
    /// )?;
    /// ```
    pub fn new<P: AsRef<Path>>(
        model_name: impl Into<String>,
        model_path: P,
        tokenizer_path: P,
        options: OnnxModelOptions,
    ) -> Result<Self> {
        let model_name = model_name.into();
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("ONNX model file not found: {}", model_path.display());
        }
        if !tokenizer_path.exists() {
            anyhow::bail!("Tokenizer file not found: {}", tokenizer_path.display());
        }

        info!("🚀 Initializing ONNX embedding model {}", model_name);

        // Try CUDA first, fall back to CPU if unavailable
        info!("   Attempting CUDA execution provider...");
        let cuda_result = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .context("Failed to set CUDA execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(options.intra_threads)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path);

        let session = match cuda_result {
            Ok(s) => {
                info!("✅ CUDA execution provider initialized");
                s
            }
            Err(e) => {
                warn!("⚠️  CUDA execution provider failed: {}", e);
                warn!("   Falling back to CPU execution provider");
                Session::builder()
                    .context("Failed to create session builder")?
                    .with_execution_providers([CPUExecutionProvider::default().build()])
                    .context("Failed to set CPU execution provider")?
                    .with_optimization_level(GraphOptimizationLevel::Level3)
                    .context("Failed to set optimization level")?
                    .with_intra_threads(options.intra_threads)
                    .context("Failed to set intra threads")?
                    .commit_from_file(model_path)
                    .with_context(|| {
                        format!("Failed to load ONNX model from {}", model_path.display())
                    })?
            }
        };

        let uses_token_type_ids = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

        let pad_id = tokenizer
            .get_padding()
            .map(|p| p.pad_id)
            .or_else(|| tokenizer.token_to_id("<pad>"))
            .or_else(|| tokenizer.token_to_id("[PAD]"))
            .unwrap_or(0);

        // Batches are padded by hand, to the longest sequence
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: options.max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Failed to configure tokenizer truncation: {}", e))?;

        let model = Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            model_name,
            dimension: options.dimension,
            max_length: options.max_length,
            pooling: options.pooling,
            batch_size: options.batch_size.max(1),
            uses_token_type_ids,
            pad_id,
        };

        let probe = model
            .embed_blocking(&[PROBE_TEXT.to_string()], false)
            .context("Probe inference failed")?;
        let actual = probe.first().map(Vec::len).unwrap_or(0);
        if actual != options.dimension {
            anyhow::bail!(
                "Model {} outputs {} dimensions (expected {})",
                model.model_name,
                actual,
                options.dimension
            );
        }

        info!(
            "✅ ONNX embedding model loaded: {} ({} dimensions, {} pooling, token_type_ids: {})",
            model.model_name, model.dimension, model.pooling, model.uses_token_type_ids
        );

        Ok(model)
    }

    /// Embeds `texts` in sub-batches of at most `batch_size` texts.
    ///
    /// Blocking. Returns one vector per input, in input order.
    pub fn embed_blocking(&self, texts: &[String], normalize: bool) -> Result<Vec<Vec<f32>>> {
        embed_in_chunks(texts, self.batch_size, |chunk| {
            self.embed_chunk(chunk, normalize)
        })
    }

    /// Runs one sub-batch through tokenizer, session and pooling.
    fn embed_chunk(&self, texts: &[String], normalize: bool) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let batch_size = encodings.len();
        let max_len = encodings
            .iter()
            .map(|enc| enc.get_ids().len())
            .max()
            .unwrap_or(0);
        if max_len == 0 {
            anyhow::bail!("Tokenizer produced no tokens for batch");
        }

        // Pad every sequence to max_len
        let mut input_ids_batch = Vec::with_capacity(batch_size * max_len);
        let mut attention_mask_batch = Vec::with_capacity(batch_size * max_len);
        let mut token_type_ids_batch = Vec::with_capacity(batch_size * max_len);

        for encoding in &encodings {
            let ids = encoding.get_ids();
            let padding_needed = max_len - ids.len();

            input_ids_batch.extend(ids.iter().map(|&id| id as i64));
            attention_mask_batch.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
            token_type_ids_batch.extend(encoding.get_type_ids().iter().map(|&t| t as i64));

            input_ids_batch.extend(std::iter::repeat(self.pad_id as i64).take(padding_needed));
            attention_mask_batch.extend(std::iter::repeat(0i64).take(padding_needed));
            token_type_ids_batch.extend(std::iter::repeat(0i64).take(padding_needed));
        }

        debug!(
            "Running ONNX inference: batch={}, seq_len={}",
            batch_size, max_len
        );

        let input_ids_array = Array2::from_shape_vec((batch_size, max_len), input_ids_batch)
            .context("Failed to create batch input_ids array")?;
        let attention_mask_array =
            Array2::from_shape_vec((batch_size, max_len), attention_mask_batch.clone())
                .context("Failed to create batch attention_mask array")?;

        let mut session_inputs: Vec<(Cow<'static, str>, SessionInputValue<'static>)> = vec![
            ("input_ids".into(), Value::from_array(input_ids_array)?.into()),
            (
                "attention_mask".into(),
                Value::from_array(attention_mask_array)?.into(),
            ),
        ];
        if self.uses_token_type_ids {
            let token_type_ids_array =
                Array2::from_shape_vec((batch_size, max_len), token_type_ids_batch)
                    .context("Failed to create batch token_type_ids array")?;
            session_inputs.push((
                "token_type_ids".into(),
                Value::from_array(token_type_ids_array)?.into(),
            ));
        }

        let mut session = lock_ignoring_poison(&self.session);
        let outputs = session.run(session_inputs)?;

        // Use index [0] instead of name since exports differ in output naming
        let output_array = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        let mut embeddings =
            self.pool_output(output_array, &attention_mask_batch, batch_size, max_len)?;

        if normalize {
            for embedding in &mut embeddings {
                l2_normalize(embedding);
            }
        }

        Ok(embeddings)
    }

    /// Turns the first graph output into one sentence vector per batch item.
    ///
    /// Rank-3 output `[batch, seq_len, hidden]` is pooled; rank-2 output
    /// `[batch, hidden]` comes from graphs with a built-in pooling head.
    fn pool_output(
        &self,
        output: ArrayViewD<'_, f32>,
        attention_mask: &[i64],
        batch_size: usize,
        max_len: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let shape = output.shape().to_vec();
        if shape.first() != Some(&batch_size) {
            anyhow::bail!(
                "Model output batch dimension mismatch: {:?} (expected {} items)",
                shape,
                batch_size
            );
        }

        let mut embeddings = Vec::with_capacity(batch_size);
        match shape.len() {
            3 => {
                for batch_idx in 0..batch_size {
                    let item = output
                        .index_axis(Axis(0), batch_idx)
                        .into_dimensionality::<Ix2>()
                        .context("Unexpected token embedding layout")?;
                    let mask = &attention_mask[batch_idx * max_len..(batch_idx + 1) * max_len];
                    embeddings.push(self.pooling.pool(item, mask)?);
                }
            }
            2 => {
                for batch_idx in 0..batch_size {
                    let row = output.index_axis(Axis(0), batch_idx);
                    embeddings.push(row.iter().copied().collect());
                }
            }
            _ => anyhow::bail!(
                "Model outputs unexpected dimensions: {:?} (expected [batch, seq_len, hidden] or [batch, hidden])",
                shape
            ),
        }

        Ok(embeddings)
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn pooling(&self) -> Pooling {
        self.pooling
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Locks `mutex`, recovering the guard if a previous holder panicked.
///
/// A panicked run leaves no partial state in the session.
fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Splits `texts` into chunks of `batch_size`, embeds each with `embed`, and
/// concatenates the results in input order.
///
/// Every chunk must yield exactly one vector per text.
pub(crate) fn embed_in_chunks<F>(
    texts: &[String],
    batch_size: usize,
    mut embed: F,
) -> Result<Vec<Vec<f32>>>
where
    F: FnMut(&[String]) -> Result<Vec<Vec<f32>>>,
{
    let mut embeddings = Vec::with_capacity(texts.len());

    for (chunk_idx, chunk) in texts.chunks(batch_size.max(1)).enumerate() {
        let vectors = embed(chunk)?;
        if vectors.len() != chunk.len() {
            anyhow::bail!(
                "Sub-batch {} produced {} vectors for {} texts",
                chunk_idx,
                vectors.len(),
                chunk.len()
            );
        }
        embeddings.extend(vectors);
    }

    Ok(embeddings)
}

#[async_trait]
impl TextEmbedder for OnnxEmbeddingModel {
    fn model_id(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: Vec<String>, normalize: bool) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Inference is CPU/GPU bound; keep it off the async workers
        let model = self.clone();
        tokio::task::spawn_blocking(move || model.embed_blocking(&texts, normalize))
            .await
            .context("Embedding task panicked or was cancelled")?
    }
}
