// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use fabstir_embed_node::{
    api::{start_server, AppState},
    cli::Cli,
    config::{init_tracing, EmbedConfig},
    embeddings::{initialize, OnnxLoader},
    monitoring::HttpMetrics,
    version,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_format);

    info!("🚀 Starting {}", version::get_version_string());
    info!("Features: {}", version::get_features_string());

    let config = EmbedConfig::from_env().context("invalid embedding configuration")?;
    info!(
        model = %config.model_name,
        max_length = config.max_length,
        cache_dir = %config.cache_dir.display(),
        batch_size = config.batch_size,
        doc_embed_type = %config.doc_embed_type,
        "🧠 Initializing embedding engine"
    );

    let engine = initialize(Arc::new(OnnxLoader), Arc::new(config)).await;

    let metrics = HttpMetrics::new().context("failed to create metrics registry")?;
    metrics.record_engine_state(&engine);

    let state = AppState::new(engine, metrics);
    let result = start_server(
        state,
        cli.socket_addr(),
        cli.request_timeout(),
        cli.max_body_bytes,
    )
    .await;

    info!("Application shutdown.");
    result
}
