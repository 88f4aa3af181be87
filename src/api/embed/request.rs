// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! EmbedRequest type for POST /embed endpoint

use serde::{Deserialize, Serialize};

/// Request body for POST /embed endpoint
///
/// `texts` may be empty. Neither the number of texts nor their length is
/// limited here; the HTTP body limit and tokenizer truncation apply.
/// Unknown fields are ignored.
///
/// # Example
/// ```json
/// {
///   "texts": ["Hello world", "Another text"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedRequest {
    /// Text strings to embed, in order
    pub texts: Vec<String>,
}
