// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Response body for POST /embeddings

use serde::{Deserialize, Serialize};

/// One vector per input text, in input order
///
/// ```json
/// { "embeddings": [[0.01, -0.02, ...], [0.03, 0.04, ...]] }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
}

impl EmbedResponse {
    pub fn empty() -> Self {
        Self { embeddings: vec![] }
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}
