// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Model resolution tests

use clap::Parser;
use embed_service::config::ServiceConfig;
use embed_service::embeddings::{
    load_model, onnx_model::OnnxModelOptions, resolve_model_files, EmbeddingModelConfig,
    ModelFiles, Pooling,
};
use std::path::PathBuf;

fn local_config(model: PathBuf, tokenizer: PathBuf) -> EmbeddingModelConfig {
    EmbeddingModelConfig {
        model_id: "BAAI/bge-m3".to_string(),
        model_path: Some(model),
        tokenizer_path: Some(tokenizer),
        options: OnnxModelOptions::default(),
    }
}

#[tokio::test]
async fn test_local_paths_are_used_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path().join("m.onnx"), dir.path().join("t.json"));

    let files = resolve_model_files(&config).await.unwrap();

    assert_eq!(
        files,
        ModelFiles {
            model_path: dir.path().join("m.onnx"),
            tokenizer_path: dir.path().join("t.json"),
        }
    );
}

#[tokio::test]
async fn test_load_fails_for_missing_local_model() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path().join("model.onnx"), dir.path().join("tokenizer.json"));

    let err = load_model(&config).await.unwrap_err();

    assert!(format!("{:#}", err).contains("ONNX model file not found"));
}

#[test]
fn test_service_config_maps_to_model_config() {
    let config = ServiceConfig::try_parse_from([
        "embed-service",
        "--model-id",
        "intfloat/multilingual-e5-large",
        "--model-path",
        "/models/e5/model.onnx",
        "--tokenizer-path",
        "/models/e5/tokenizer.json",
        "--pooling",
        "mean",
        "--max-length",
        "512",
        "--batch-size",
        "8",
    ])
    .unwrap();

    let model_config = config.model_config();

    assert_eq!(model_config.model_id, "intfloat/multilingual-e5-large");
    assert_eq!(
        model_config.model_path,
        Some(PathBuf::from("/models/e5/model.onnx"))
    );
    assert_eq!(model_config.options.pooling, Pooling::Mean);
    assert_eq!(model_config.options.max_length, 512);
    assert_eq!(model_config.options.batch_size, 8);
    assert_eq!(model_config.options.dimension, 1024);
}
