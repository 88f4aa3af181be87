// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! EmbedResponse type for POST /embed endpoint

use crate::api::ApiError;
use serde::{Deserialize, Serialize};

/// Response body for POST /embed endpoint
///
/// `vectors[i]` is the embedding of `texts[i]`. Vectors are not
/// unit-normalized.
///
/// # Example
/// ```json
/// {
///   "vectors": [[0.1, -0.2, ...], [0.3, 0.05, ...]]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub vectors: Vec<Vec<f32>>,
}

impl EmbedResponse {
    /// Checks the batch against the request it answers.
    ///
    /// There must be exactly `expected_count` vectors, each of length
    /// `dimension` and holding only finite values (JSON has no NaN or
    /// infinity).
    pub fn validate(&self, expected_count: usize, dimension: usize) -> Result<(), ApiError> {
        if self.vectors.len() != expected_count {
            return Err(ApiError::InternalError(format!(
                "model returned {} vectors for {} texts",
                self.vectors.len(),
                expected_count
            )));
        }

        for (index, vector) in self.vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(ApiError::InternalError(format!(
                    "vectors[{}] has {} dimensions (expected {})",
                    index,
                    vector.len(),
                    dimension
                )));
            }
            if let Some(position) = vector.iter().position(|x| !x.is_finite()) {
                return Err(ApiError::InternalError(format!(
                    "vectors[{}][{}] is not finite ({})",
                    index, position, vector[position]
                )));
            }
        }

        Ok(())
    }

    pub fn vector_count(&self) -> usize {
        self.vectors.len()
    }
}

impl From<Vec<Vec<f32>>> for EmbedResponse {
    fn from(vectors: Vec<Vec<f32>>) -> Self {
        EmbedResponse { vectors }
    }
}
