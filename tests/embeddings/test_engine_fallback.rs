// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Startup tier fallback, observed through the HTTP surface

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use fabstir_embed_node::api::{create_app, AppState};
use fabstir_embed_node::config::{EmbedConfig, EmbedType};
use fabstir_embed_node::embeddings::{
    initialize, EngineState, ScriptedEngineLoader, StubEmbeddingEngine, Tier,
};
use fabstir_embed_node::monitoring::HttpMetrics;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

async fn get_json(state: AppState, uri: &str) -> (StatusCode, serde_json::Value) {
    let app = create_app(state, None);
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn config_from(pairs: &[(&str, &str)]) -> EmbedConfig {
    let env: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    EmbedConfig::from_lookup(|key| env.get(key).cloned()).unwrap()
}

#[tokio::test]
async fn test_fallback_engine_is_reported_by_health() {
    let cpu = Arc::new(StubEmbeddingEngine::new("BAAI/bge-small-en-v1.5", 16));
    let loader = Arc::new(
        ScriptedEngineLoader::new()
            .with_failure(Tier::Accelerated, "CUDA driver version is insufficient")
            .with_engine(Tier::Fallback, cpu),
    );
    let config = Arc::new(config_from(&[
        ("EMBED_MAX_LENGTH", "256"),
        ("EMBED_BATCH_SIZE", "32"),
        ("EMBED_DOC_EMBED_TYPE", "passage"),
    ]));

    let engine = initialize(loader.clone(), config.clone()).await;
    assert_eq!(engine.tier(), Some(Tier::Fallback));

    // Both tiers saw the identical configuration
    let attempts = loader.attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0], (Tier::Accelerated, (*config).clone()));
    assert_eq!(attempts[1], (Tier::Fallback, (*config).clone()));
    assert_eq!(attempts[1].1.doc_embed_type, EmbedType::Passage);

    let state = AppState::new(engine, HttpMetrics::new().unwrap());
    let (status, body) = get_json(state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"], "BAAI/bge-small-en-v1.5");
    assert_eq!(body["tier"], "fallback");
}

#[tokio::test]
async fn test_accelerated_engine_skips_fallback() {
    let gpu = Arc::new(StubEmbeddingEngine::new("gpu-model", 16));
    let loader = Arc::new(ScriptedEngineLoader::new().with_engine(Tier::Accelerated, gpu));

    let engine = initialize(loader.clone(), Arc::new(EmbedConfig::default())).await;
    assert_eq!(engine.tier(), Some(Tier::Accelerated));
    assert_eq!(loader.attempts().len(), 1);
}

#[tokio::test]
async fn test_both_tiers_failing_leaves_service_up() {
    let loader = Arc::new(
        ScriptedEngineLoader::new()
            .with_failure(Tier::Accelerated, "no CUDA")
            .with_failure(Tier::Fallback, "model file corrupt"),
    );

    let engine = initialize(loader.clone(), Arc::new(EmbedConfig::default())).await;
    assert!(!engine.is_ready());
    match &engine {
        EngineState::Unavailable { failures } => {
            assert_eq!(failures.len(), 2);
            assert!(failures[1].reason.contains("model file corrupt"));
        }
        other => panic!("expected Unavailable, got {:?}", other),
    }

    let metrics = HttpMetrics::new().unwrap();
    metrics.record_engine_state(&engine);
    assert!(metrics.render().unwrap().contains("fastembed_engine_ready 0"));

    let state = AppState::new(engine, metrics);
    let (status, body) = get_json(state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["model"].is_null());
    assert!(body.get("tier").is_none());
}

#[test]
fn test_bogus_embed_type_is_clamped() {
    let config = config_from(&[("EMBED_DOC_EMBED_TYPE", "bogus")]);
    assert_eq!(config.doc_embed_type, EmbedType::Default);
}
