// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-process engines for tests and benchmarks
//!
//! [`StubEmbeddingEngine`] produces deterministic pseudo-random vectors from a
//! hash of each input, so callers can check positional correspondence without
//! model files. [`ScriptedEngineLoader`] returns a pre-arranged outcome per
//! tier and records every attempt.

use crate::config::EmbedConfig;
use crate::embeddings::{EmbeddingEngine, EngineError, EngineInitError, EngineLoader, Tier};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What a [`StubEmbeddingEngine`] does when asked to embed
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Deterministic vectors derived from each text
    Hash,
    /// Every call fails with `EngineError::Inference`
    Fail(String),
    /// Every call panics
    Panic,
    /// Drops the last vector of every non-empty batch
    Truncate,
}

#[derive(Debug)]
pub struct StubEmbeddingEngine {
    model_name: String,
    dimension: usize,
    behavior: MockBehavior,
    calls: AtomicUsize,
}

impl StubEmbeddingEngine {
    pub fn new(model_name: impl Into<String>, dimension: usize) -> Self {
        Self::with_behavior(model_name, dimension, MockBehavior::Hash)
    }

    pub fn with_behavior(
        model_name: impl Into<String>,
        dimension: usize,
        behavior: MockBehavior,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            dimension,
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed` invocations so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The vector this engine produces for `text`
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut current_seed = hasher.finish();

        let mut embedding = Vec::with_capacity(self.dimension);
        for i in 0..self.dimension {
            // Linear congruential generator, values in [-1, 1]
            current_seed =
                (current_seed.wrapping_mul(1664525).wrapping_add(1013904223)) ^ (i as u64);
            let value = (current_seed as f64 / u64::MAX as f64) * 2.0 - 1.0;
            embedding.push(value as f32);
        }

        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }
        embedding
    }
}

impl EmbeddingEngine for StubEmbeddingEngine {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            MockBehavior::Hash => Ok(texts.iter().map(|t| self.embed_one(t)).collect()),
            MockBehavior::Fail(message) => Err(EngineError::Inference(message.clone())),
            MockBehavior::Panic => panic!("stub engine panicked"),
            MockBehavior::Truncate => {
                let mut out: Vec<Vec<f32>> = texts.iter().map(|t| self.embed_one(t)).collect();
                out.pop();
                Ok(out)
            }
        }
    }
}

/// Loader returning a fixed outcome per tier. Tiers without an outcome fail.
#[derive(Default)]
pub struct ScriptedEngineLoader {
    outcomes: HashMap<Tier, Result<Arc<StubEmbeddingEngine>, EngineInitError>>,
    attempts: Mutex<Vec<(Tier, EmbedConfig)>>,
}

impl ScriptedEngineLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(mut self, tier: Tier, engine: Arc<StubEmbeddingEngine>) -> Self {
        self.outcomes.insert(tier, Ok(engine));
        self
    }

    pub fn with_failure(mut self, tier: Tier, reason: impl Into<String>) -> Self {
        self.outcomes.insert(
            tier,
            Err(EngineInitError::Session {
                tier,
                reason: reason.into(),
            }),
        );
        self
    }

    /// Every `(tier, config)` pair passed to `load`, in call order
    pub fn attempts(&self) -> Vec<(Tier, EmbedConfig)> {
        self.attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl EngineLoader for ScriptedEngineLoader {
    fn load(
        &self,
        config: &EmbedConfig,
        tier: Tier,
    ) -> Result<Arc<dyn EmbeddingEngine>, EngineInitError> {
        self.attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((tier, config.clone()));

        match self.outcomes.get(&tier) {
            Some(Ok(engine)) => Ok(engine.clone() as Arc<dyn EmbeddingEngine>),
            Some(Err(e)) => Err(e.clone()),
            None => Err(EngineInitError::Session {
                tier,
                reason: format!("no {} device available", tier),
            }),
        }
    }
}
