// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Hash-seeded embedder for tests and benchmarks
//!
//! Produces pseudo-random vectors derived from the text hash, so the same
//! text always maps to the same vector and different texts (almost always)
//! map to different ones. No model files are needed.

use super::{l2_normalize, TextEmbedder};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone)]
pub struct DeterministicEmbedder {
    model_id: String,
    dimension: usize,
}

impl DeterministicEmbedder {
    pub fn new(model_id: impl Into<String>, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(anyhow!("Embedding dimension must be greater than 0"));
        }

        Ok(Self {
            model_id: model_id.into(),
            dimension,
        })
    }

    /// Generates the vector for a single text
    pub fn generate(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        let mut embedding = Vec::with_capacity(self.dimension);

        // Linear congruential generator seeded by the text hash
        let mut current_seed = seed;
        for i in 0..self.dimension {
            current_seed =
                (current_seed.wrapping_mul(1664525).wrapping_add(1013904223)) ^ (i as u64);

            // Map to [-1, 1]
            let value = (current_seed as f64 / u64::MAX as f64) * 2.0 - 1.0;
            embedding.push(value as f32);
        }

        embedding
    }
}

#[async_trait]
impl TextEmbedder for DeterministicEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: Vec<String>, normalize: bool) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut embedding = self.generate(text);
                if normalize {
                    l2_normalize(&mut embedding);
                }
                embedding
            })
            .collect())
    }
}
