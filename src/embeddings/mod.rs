// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Embedding engine
//!
//! The HTTP layer only ever sees the [`EmbeddingEngine`] trait. Engines are
//! produced per hardware [`Tier`] by an [`EngineLoader`]; the
//! [`model_manager`] walks the tiers in preference order and settles on a
//! single [`EngineState`] for the lifetime of the process.

pub mod artifacts;
pub mod mock;
pub mod model_manager;
pub mod onnx_model;

pub use artifacts::ModelArtifacts;
pub use mock::{MockBehavior, ScriptedEngineLoader, StubEmbeddingEngine};
pub use model_manager::{acquire, attempt_tier, initialize, EngineState, TierFailure};
pub use onnx_model::{OnnxEmbeddingModel, OnnxLoader, Pooling};

use crate::config::EmbedConfig;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Hardware execution context an engine is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// GPU via the CUDA execution provider
    Accelerated,
    /// General purpose CPU
    Fallback,
}

impl Tier {
    /// Order in which tiers are attempted at startup
    pub const PREFERENCE: [Tier; 2] = [Tier::Accelerated, Tier::Fallback];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Accelerated => "accelerated",
            Tier::Fallback => "fallback",
        }
    }

    /// ONNX Runtime execution provider backing this tier
    pub fn execution_provider(&self) -> &'static str {
        match self {
            Tier::Accelerated => "CUDAExecutionProvider",
            Tier::Fallback => "CPUExecutionProvider",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a loaded engine while computing embeddings
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("tokenization failed: {0}")]
    Tokenization(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("engine returned {actual} embeddings for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedding dimension {actual} does not match model dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EngineError {
    /// Stable name used as the failure type in logs
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Tokenization(_) => "tokenization",
            EngineError::Inference(_) => "inference",
            EngineError::CountMismatch { .. } => "count_mismatch",
            EngineError::DimensionMismatch { .. } => "dimension_mismatch",
        }
    }
}

/// Failure to bring an engine up on one tier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineInitError {
    #[error("failed to resolve model artifacts for {model}: {reason}")]
    Artifacts { model: String, reason: String },

    #[error("{tier} session could not be created: {reason}")]
    Session { tier: Tier, reason: String },

    #[error("failed to load tokenizer: {0}")]
    Tokenizer(String),

    #[error("model validation failed: {0}")]
    Validation(String),

    #[error("engine loader panicked: {0}")]
    Panicked(String),
}

/// A loaded embedding model. Shared read-only across requests.
pub trait EmbeddingEngine: Send + Sync {
    /// Model identifier reported by `/health`
    fn model_name(&self) -> &str;

    /// Length of every vector this engine produces
    fn dimension(&self) -> usize;

    /// Embeds `texts`, returning exactly one vector per input in input order.
    ///
    /// May block; callers on the async runtime should use `spawn_blocking`.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError>;
}

/// Constructs engines for a given tier
#[cfg_attr(test, mockall::automock)]
pub trait EngineLoader: Send + Sync {
    fn load(
        &self,
        config: &EmbedConfig,
        tier: Tier,
    ) -> Result<Arc<dyn EmbeddingEngine>, EngineInitError>;
}

/// Best-effort extraction of a panic payload's message
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
