// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Sentence pooling over token-level transformer output
//!
//! Transformer graphs exported without a pooling head produce one hidden
//! state per token: `[batch, seq_len, hidden_dim]`. These helpers reduce a
//! single `[seq_len, hidden_dim]` slice to one sentence vector.

use anyhow::{anyhow, Result};
use ndarray::{ArrayView2, Axis};
use std::fmt;
use std::str::FromStr;

/// Strategy used to collapse token embeddings into a sentence embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pooling {
    /// Hidden state of the first (`<s>` / `[CLS]`) token.
    /// This is what BAAI/bge-m3 uses for dense retrieval.
    #[default]
    Cls,
    /// Attention-mask weighted mean over all real tokens
    Mean,
}

impl Pooling {
    /// Pools one sequence.
    ///
    /// `mask` holds the attention mask for the sequence (1 for real tokens,
    /// 0 for padding) and must be as long as the sequence axis of `tokens`.
    pub fn pool(&self, tokens: ArrayView2<'_, f32>, mask: &[i64]) -> Result<Vec<f32>> {
        let seq_len = tokens.len_of(Axis(0));
        if seq_len == 0 {
            return Err(anyhow!("Cannot pool an empty token sequence"));
        }
        if mask.len() != seq_len {
            return Err(anyhow!(
                "Attention mask length {} does not match sequence length {}",
                mask.len(),
                seq_len
            ));
        }

        match self {
            Pooling::Cls => Ok(tokens.index_axis(Axis(0), 0).to_vec()),
            Pooling::Mean => {
                let hidden_dim = tokens.len_of(Axis(1));
                let mut pooled = vec![0.0f32; hidden_dim];
                let mut sum_mask = 0.0f32;

                for (row, &m) in tokens.outer_iter().zip(mask) {
                    let mask_value = m as f32;
                    sum_mask += mask_value;
                    for (acc, value) in pooled.iter_mut().zip(row.iter()) {
                        *acc += value * mask_value;
                    }
                }

                for val in &mut pooled {
                    *val /= sum_mask.max(1e-9);
                }

                Ok(pooled)
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Pooling::Cls => "cls",
            Pooling::Mean => "mean",
        }
    }
}

impl fmt::Display for Pooling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pooling {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cls" => Ok(Pooling::Cls),
            "mean" => Ok(Pooling::Mean),
            other => Err(anyhow!(
                "Unknown pooling strategy '{}' (expected 'cls' or 'mean')",
                other
            )),
        }
    }
}

/// Scales `vector` to unit L2 length in place. Zero vectors are left as-is.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
