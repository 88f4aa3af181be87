// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Error Handling Tests for POST /embed
//!
//! - malformed bodies are client errors and carry no vectors
//! - inference failures are server errors without internal details
//! - a failed request does not affect the next one

use super::common::{app_with, json_post, send, test_app};
use anyhow::anyhow;
use async_trait::async_trait;
use axum::{body::Body, http::Request, http::StatusCode};
use embed_service::{api::ApiConfig, embeddings::TextEmbedder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

async fn assert_client_error(body: &str, expected: StatusCode) {
    let (status, json) = send(test_app(), json_post("/embed", body.to_string())).await;

    assert_eq!(status, expected, "body {:?}", body);
    assert!(status.is_client_error());
    assert!(json.get("vectors").is_none(), "no vectors on error: {}", json);
}

#[tokio::test]
async fn test_texts_is_number() {
    assert_client_error(r#"{"texts": 42}"#, StatusCode::UNPROCESSABLE_ENTITY).await;
}

#[tokio::test]
async fn test_texts_missing() {
    assert_client_error(r#"{}"#, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_client_error(r#"{"text": ["a"]}"#, StatusCode::UNPROCESSABLE_ENTITY).await;
}

#[tokio::test]
async fn test_texts_contains_non_string() {
    assert_client_error(r#"{"texts": ["a", 1, null]}"#, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_client_error(r#"{"texts": "hello"}"#, StatusCode::UNPROCESSABLE_ENTITY).await;
}

#[tokio::test]
async fn test_invalid_json() {
    assert_client_error(r#"{"texts": ["a""#, StatusCode::BAD_REQUEST).await;
}

#[tokio::test]
async fn test_validation_error_body() {
    let (_, json) = send(test_app(), json_post("/embed", r#"{"texts": 42}"#)).await;

    assert_eq!(json["error_type"], "validation_error");
    assert_eq!(json["details"]["field"], "body");
    assert!(json["message"].as_str().unwrap().contains("texts"));
}

#[tokio::test]
async fn test_missing_content_type() {
    let request = Request::builder()
        .method("POST")
        .uri("/embed")
        .body(Body::from(r#"{"texts": ["a"]}"#))
        .unwrap();

    let (status, json) = send(test_app(), request).await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(json["error_type"], "unsupported_media_type");
}

#[tokio::test]
async fn test_body_over_limit() {
    let config = ApiConfig {
        max_body_bytes: 64,
        ..ApiConfig::default()
    };
    let app = app_with(super::common::test_embedder(), &config);
    let body = serde_json::json!({ "texts": ["x".repeat(256)] }).to_string();

    let (status, json) = send(app, json_post("/embed", body)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["error_type"], "payload_too_large");
}

/// Fails the first call, succeeds afterwards
struct FlakyEmbedder {
    failed_once: AtomicBool,
}

#[async_trait]
impl TextEmbedder for FlakyEmbedder {
    fn model_id(&self) -> &str {
        "flaky"
    }

    fn dimension(&self) -> usize {
        4
    }

    async fn embed_batch(
        &self,
        texts: Vec<String>,
        _normalize: bool,
    ) -> anyhow::Result<Vec<Vec<f32>>> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(anyhow!("CUDA error: out of memory at 0xdeadbeef"));
        }
        Ok(texts.iter().map(|_| vec![1.0; 4]).collect())
    }
}

#[tokio::test]
async fn test_inference_failure_then_recovery() {
    let app = app_with(
        Arc::new(FlakyEmbedder {
            failed_once: AtomicBool::new(false),
        }),
        &ApiConfig::default(),
    );

    let (status, json) = send(app.clone(), json_post("/embed", r#"{"texts": ["a"]}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error_type"], "internal_error");
    assert!(json.get("vectors").is_none());
    assert!(!json.to_string().contains("deadbeef"), "internal details leaked");

    // No retry inside the service; the next request is served normally
    let (status, json) = send(app, json_post("/embed", r#"{"texts": ["a", "b"]}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["vectors"].as_array().unwrap().len(), 2);
}

/// Returns NaN or a short batch depending on the first text
struct MalformedEmbedder;

#[async_trait]
impl TextEmbedder for MalformedEmbedder {
    fn model_id(&self) -> &str {
        "malformed"
    }

    fn dimension(&self) -> usize {
        2
    }

    async fn embed_batch(
        &self,
        texts: Vec<String>,
        _normalize: bool,
    ) -> anyhow::Result<Vec<Vec<f32>>> {
        match texts.first().map(String::as_str) {
            Some("nan") => Ok(vec![vec![f32::NAN, 1.0]; texts.len()]),
            _ => Ok(vec![vec![0.0, 1.0]; texts.len().saturating_sub(1)]),
        }
    }
}

#[tokio::test]
async fn test_non_finite_output_is_server_error() {
    let app = app_with(Arc::new(MalformedEmbedder), &ApiConfig::default());

    let (status, json) = send(app, json_post("/embed", r#"{"texts": ["nan"]}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json.get("vectors").is_none(), "null vectors served: {}", json);
    assert_eq!(json["message"], "embedding inference failed");
}

#[tokio::test]
async fn test_short_batch_message_is_generic() {
    let app = app_with(Arc::new(MalformedEmbedder), &ApiConfig::default());

    let (status, json) = send(app, json_post("/embed", r#"{"texts": ["a", "b"]}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["message"], "embedding inference failed");
    assert!(!json.to_string().contains("vectors for"));
}
