// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding engine initialization with tier fallback
//!
//! The engine is acquired exactly once, before the HTTP listener is bound:
//!
//! ```text
//! uninitialized ──► accelerated ready
//!        │
//!        └─ fail ─► fallback ready
//!                      │
//!                      └─ fail ─► unavailable (no retry, restart required)
//! ```
//!
//! Each tier attempt is an ordinary `Result`; [`acquire`] folds them into an
//! [`EngineState`]. Initialization never fails the process: a node without an
//! engine still serves `/health`, `/metrics` and 503s on `/embeddings`.

use crate::config::EmbedConfig;
use crate::embeddings::{panic_message, EmbeddingEngine, EngineInitError, EngineLoader, Tier};
use serde::Serialize;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Why a tier could not be brought up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierFailure {
    pub tier: Tier,
    pub reason: String,
}

/// Process-wide engine state, settled once at startup
#[derive(Clone)]
pub enum EngineState {
    Ready {
        engine: Arc<dyn EmbeddingEngine>,
        tier: Tier,
    },
    Unavailable {
        failures: Vec<TierFailure>,
    },
}

impl EngineState {
    pub fn engine(&self) -> Option<&Arc<dyn EmbeddingEngine>> {
        match self {
            EngineState::Ready { engine, .. } => Some(engine),
            EngineState::Unavailable { .. } => None,
        }
    }

    pub fn tier(&self) -> Option<Tier> {
        match self {
            EngineState::Ready { tier, .. } => Some(*tier),
            EngineState::Unavailable { .. } => None,
        }
    }

    /// Model identifier of the loaded engine, `None` when unavailable
    pub fn model_name(&self) -> Option<&str> {
        self.engine().map(|engine| engine.model_name())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, EngineState::Ready { .. })
    }
}

impl fmt::Debug for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Ready { engine, tier } => f
                .debug_struct("Ready")
                .field("model", &engine.model_name())
                .field("dimension", &engine.dimension())
                .field("tier", tier)
                .finish(),
            EngineState::Unavailable { failures } => f
                .debug_struct("Unavailable")
                .field("failures", failures)
                .finish(),
        }
    }
}

/// Attempts to construct the engine on a single tier.
///
/// A panic inside the loader counts as that tier's failure.
pub fn attempt_tier(
    loader: &dyn EngineLoader,
    config: &EmbedConfig,
    tier: Tier,
) -> Result<Arc<dyn EmbeddingEngine>, EngineInitError> {
    info!(
        "Loading embedding model '{}' on {} tier ({})",
        config.model_name,
        tier,
        tier.execution_provider()
    );

    match catch_unwind(AssertUnwindSafe(|| loader.load(config, tier))) {
        Ok(result) => result,
        Err(payload) => Err(EngineInitError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Walks [`Tier::PREFERENCE`] until one tier loads. Never fails.
pub fn acquire(loader: &dyn EngineLoader, config: &EmbedConfig) -> EngineState {
    let started = Instant::now();
    let mut failures = Vec::new();

    for tier in Tier::PREFERENCE {
        match attempt_tier(loader, config, tier) {
            Ok(engine) => {
                info!(
                    model = %engine.model_name(),
                    tier = %tier,
                    dimension = engine.dimension(),
                    load_time_s = format!("{:.4}", started.elapsed().as_secs_f64()),
                    "✅ Embedding model '{}' loaded successfully ({})",
                    engine.model_name(),
                    tier
                );
                return EngineState::Ready { engine, tier };
            }
            Err(e) => {
                match tier {
                    Tier::Accelerated => {
                        warn!(tier = %tier, "⚠️  Error loading embedding model on {} tier: {}", tier, e);
                        warn!("   Falling back to CPU");
                    }
                    Tier::Fallback => {
                        error!(tier = %tier, "❌ Error loading embedding model on {} tier: {}", tier, e);
                    }
                }
                failures.push(TierFailure {
                    tier,
                    reason: e.to_string(),
                });
            }
        }
    }

    error!(
        model = %config.model_name,
        "Embedding engine unavailable after {} attempts; /embeddings will return 503 until restart",
        failures.len()
    );
    EngineState::Unavailable { failures }
}

/// Runs [`acquire`] on the blocking pool so model loading does not stall the runtime.
pub async fn initialize(loader: Arc<dyn EngineLoader>, config: Arc<EmbedConfig>) -> EngineState {
    match tokio::task::spawn_blocking(move || acquire(loader.as_ref(), &config)).await {
        Ok(state) => state,
        Err(e) => {
            error!("Embedding engine initialization task failed: {}", e);
            EngineState::Unavailable {
                failures: Vec::new(),
            }
        }
    }
}
