// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding model resolution and loading
//!
//! A model is named by a HuggingFace hub identifier (e.g. "BAAI/bge-m3").
//! Local file paths may be configured instead; otherwise the ONNX export and
//! tokenizer are fetched into the hub cache (`HF_HOME`) on first start.

use super::onnx_model::{OnnxEmbeddingModel, OnnxModelOptions};
use super::TextEmbedder;
use anyhow::{Context, Result};
use hf_hub::api::tokio::ApiBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

const ONNX_MODEL_CANDIDATES: &[&str] = &["onnx/model.onnx", "model.onnx"];
const TOKENIZER_CANDIDATES: &[&str] = &["tokenizer.json", "onnx/tokenizer.json"];

/// Configuration for loading the embedding model
#[derive(Debug, Clone)]
pub struct EmbeddingModelConfig {
    /// Hub identifier, reported by `/health`
    pub model_id: String,
    /// Local ONNX model file; skips the hub download when set with `tokenizer_path`
    pub model_path: Option<PathBuf>,
    /// Local tokenizer JSON file
    pub tokenizer_path: Option<PathBuf>,
    pub options: OnnxModelOptions,
}

/// Local paths of the files a model needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

/// Files to fetch from a hub repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RepoSelection {
    pub model: String,
    /// External weights stored next to the graph (`<model>_data`)
    pub external_data: Option<String>,
    pub tokenizer: String,
}

/// Picks the ONNX graph, its external data and the tokenizer from a
/// repository file listing.
pub(crate) fn select_repo_files(model_id: &str, files: &[String]) -> Result<RepoSelection> {
    let has = |name: &str| files.iter().any(|f| f == name);

    let model = ONNX_MODEL_CANDIDATES
        .iter()
        .find(|c| has(c))
        .with_context(|| format!("Repository {} has no ONNX export", model_id))?
        .to_string();

    let data_name = format!("{}_data", model);
    let external_data = has(&data_name).then_some(data_name);

    let tokenizer = TOKENIZER_CANDIDATES
        .iter()
        .find(|c| has(c))
        .with_context(|| format!("Repository {} has no tokenizer.json", model_id))?
        .to_string();

    Ok(RepoSelection {
        model,
        external_data,
        tokenizer,
    })
}

/// Resolves the model and tokenizer files, downloading from the hub when no
/// local paths are configured.
pub async fn resolve_model_files(config: &EmbeddingModelConfig) -> Result<ModelFiles> {
    if let (Some(model_path), Some(tokenizer_path)) = (&config.model_path, &config.tokenizer_path)
    {
        info!(
            "Using local model files: {} / {}",
            model_path.display(),
            tokenizer_path.display()
        );
        return Ok(ModelFiles {
            model_path: model_path.clone(),
            tokenizer_path: tokenizer_path.clone(),
        });
    }

    info!("🔁 Resolving embedding model {} from HuggingFace hub", config.model_id);

    let api = ApiBuilder::new()
        .with_progress(false)
        .build()
        .context("Failed to initialize HuggingFace hub client")?;
    let repo = api.model(config.model_id.clone());

    let repo_info = repo
        .info()
        .await
        .with_context(|| format!("Failed to fetch repository info for {}", config.model_id))?;
    let files: Vec<String> = repo_info
        .siblings
        .into_iter()
        .map(|s| s.rfilename)
        .collect();
    let selection = select_repo_files(&config.model_id, &files)?;

    let model_path = repo
        .get(&selection.model)
        .await
        .with_context(|| format!("Failed to download {}", selection.model))?;

    // ONNX Runtime expects external weights beside the graph, which the
    // hub cache snapshot layout preserves
    if let Some(data) = &selection.external_data {
        info!("   Fetching external weights {}", data);
        repo.get(data)
            .await
            .with_context(|| format!("Failed to download {}", data))?;
    }

    let tokenizer_path = repo
        .get(&selection.tokenizer)
        .await
        .with_context(|| format!("Failed to download {}", selection.tokenizer))?;

    info!("✓ Model files cached at {}", model_path.display());

    Ok(ModelFiles {
        model_path,
        tokenizer_path,
    })
}

/// Resolves and loads the configured model.
///
/// Loading runs on the blocking pool. Any failure here is fatal to startup.
pub async fn load_model(config: &EmbeddingModelConfig) -> Result<Arc<OnnxEmbeddingModel>> {
    let files = resolve_model_files(config).await?;

    let model_id = config.model_id.clone();
    let options = config.options.clone();
    let expected = options.dimension;

    let model = tokio::task::spawn_blocking(move || {
        OnnxEmbeddingModel::new(model_id, files.model_path, files.tokenizer_path, options)
    })
    .await
    .context("Model loading task panicked")?
    .map_err(|e| {
        error!("✗ Failed to load model {}: {:#}", config.model_id, e);
        e
    })?;

    if model.dimension() != expected {
        anyhow::bail!(
            "Model {} dimension mismatch: expected {}, got {}",
            config.model_id,
            expected,
            model.dimension()
        );
    }

    info!(
        "✓ Successfully loaded model: {} ({} dimensions)",
        model.model_id(),
        model.dimension()
    );

    Ok(Arc::new(model))
}
