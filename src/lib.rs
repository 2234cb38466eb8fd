// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod embeddings;
pub mod monitoring;
pub mod version;

// Re-export main types
pub use api::{create_app, AppState};
pub use config::{EmbedConfig, EmbedType};
pub use embeddings::{EmbeddingEngine, EngineLoader, EngineState, Tier};
pub use monitoring::HttpMetrics;
