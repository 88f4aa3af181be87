// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /embed HTTP handler

use crate::api::embed::{EmbedRequest, EmbedResponse};
use crate::api::http_server::AppState;
use crate::api::ApiError;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::{debug, error, warn};

/// POST /embed handler
///
/// Passes the texts unmodified to the loaded model with normalization
/// disabled and returns one vector per text, in request order.
///
/// # Request Body
/// ```json
/// { "texts": ["text1", "text2"] }
/// ```
///
/// # Response Body
/// ```json
/// { "vectors": [[0.1, 0.2, ...], [0.3, 0.4, ...]] }
/// ```
///
/// # Errors
/// - 400 / 415 / 413: body is not acceptable JSON
/// - 422: body does not have the `{"texts": [string]}` shape
/// - 500: inference failed
pub async fn embed_handler(
    State(state): State<AppState>,
    payload: Result<Json<EmbedRequest>, JsonRejection>,
) -> Result<Json<EmbedResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected embed request: {}", rejection.body_text());
        ApiError::from(rejection)
    })?;

    let text_count = request.texts.len();
    debug!("Embedding {} texts", text_count);

    let vectors = state
        .embedder
        .embed_batch(request.texts, false)
        .await
        .map_err(|e| {
            error!("Embedding inference failed for {} texts: {:#}", text_count, e);
            ApiError::InternalError("embedding inference failed".to_string())
        })?;

    let response = EmbedResponse::from(vectors);
    response
        .validate(text_count, state.embedder.dimension())
        .map_err(|e| {
            error!("Model returned a malformed batch: {}", e);
            ApiError::InternalError("embedding inference failed".to_string())
        })?;

    Ok(Json(response))
}
