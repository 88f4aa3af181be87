// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /embed success-path tests
//!
//! Verify the response contract:
//! - one vector per input text, in input order
//! - every vector has the model dimension
//! - empty input yields an empty result
//! - repeated calls are stable
//! - vectors are returned unnormalized

use super::common::{json_post, send, test_app, test_embedder, vectors_of, TEST_DIMENSION};
use axum::http::StatusCode;
use embed_service::EmbedRequest;

fn body_for(texts: &[&str]) -> String {
    serde_json::to_string(&EmbedRequest {
        texts: texts.iter().map(|t| t.to_string()).collect(),
    })
    .unwrap()
}

#[tokio::test]
async fn test_embed_hello_world() {
    let request = json_post("/embed", body_for(&["hello", "world"]));
    let (status, body) = send(test_app(), request).await;

    assert_eq!(status, StatusCode::OK);
    let vectors = vectors_of(&body);
    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[0].len(), TEST_DIMENSION);
    assert_eq!(vectors[1].len(), TEST_DIMENSION);
}

#[tokio::test]
async fn test_embed_preserves_order() {
    let embedder = test_embedder();
    let texts = ["first", "second", "third", "second"];

    let (status, body) = send(test_app(), json_post("/embed", body_for(&texts))).await;

    assert_eq!(status, StatusCode::OK);
    let vectors = vectors_of(&body);
    assert_eq!(vectors.len(), texts.len());
    for (text, vector) in texts.iter().zip(&vectors) {
        assert_eq!(
            vector,
            &embedder.generate(text),
            "vector for {:?} out of place",
            text
        );
    }
    // Duplicate inputs produce duplicate outputs at their own positions
    assert_eq!(vectors[1], vectors[3]);
    assert_ne!(vectors[0], vectors[1]);
}

#[tokio::test]
async fn test_embed_empty_texts() {
    let (status, body) = send(test_app(), json_post("/embed", r#"{"texts": []}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "vectors": [] }));
}

#[tokio::test]
async fn test_embed_accepts_unusual_strings() {
    let long_text = "word ".repeat(20_000);
    let texts = ["", "   ", "émoji 🚀 and ünïcode", long_text.as_str()];

    let (status, body) = send(test_app(), json_post("/embed", body_for(&texts))).await;

    assert_eq!(status, StatusCode::OK);
    let vectors = vectors_of(&body);
    assert_eq!(vectors.len(), 4);
    assert!(vectors.iter().all(|v| v.len() == TEST_DIMENSION));
}

#[tokio::test]
async fn test_embed_is_idempotent() {
    let body = body_for(&["same input", "another input"]);

    let (_, first) = send(test_app(), json_post("/embed", body.clone())).await;
    let (_, second) = send(test_app(), json_post("/embed", body)).await;

    assert_eq!(vectors_of(&first), vectors_of(&second));
}

#[tokio::test]
async fn test_embed_returns_unnormalized_vectors() {
    let (_, body) = send(test_app(), json_post("/embed", body_for(&["norm check"]))).await;

    let vector = &vectors_of(&body)[0];
    let magnitude = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!(
        (magnitude - 1.0).abs() > 0.01,
        "vector should not be unit length, got magnitude {}",
        magnitude
    );
}

#[tokio::test]
async fn test_embed_ignores_extra_fields() {
    let (status, body) = send(
        test_app(),
        json_post("/embed", r#"{"texts": ["a"], "normalize": true}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(vectors_of(&body).len(), 1);
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let app = test_app();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let texts: Vec<String> =
                    (0..=i).map(|j| format!("req {} text {}", i, j)).collect();
                let body = serde_json::to_string(&EmbedRequest { texts }).unwrap();
                let (status, body) = send(app, json_post("/embed", body)).await;
                (i, status, vectors_of(&body).len())
            })
        })
        .collect();

    for handle in handles {
        let (i, status, count) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(count, i + 1);
    }
}
