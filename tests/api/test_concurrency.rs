// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Concurrent requests against a shared engine and metrics registry

use super::support::*;
use axum::http::StatusCode;
use fabstir_embed_node::api::{create_app, EmbedResponse};
use fabstir_embed_node::embeddings::Tier;
use futures_util::future::join_all;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_hundred_concurrent_requests_are_paired_and_counted() {
    let engine = stub_engine("stub");
    let state = ready_state(engine.clone(), Tier::Accelerated);
    let metrics = state.metrics.clone();
    let app = create_app(state, None);

    let requests = (0..100).map(|i| {
        let app = app.clone();
        async move {
            let texts = [format!("request {} first", i), format!("request {} second", i)];
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            let response = send(app, embed_request(&refs)).await;
            (texts, response)
        }
    });

    for (texts, response) in join_all(requests).await {
        assert_eq!(response.status, StatusCode::OK);
        let body: EmbedResponse = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body.embeddings.len(), 2);
        assert_eq!(body.embeddings[0], engine.embed_one(&texts[0]));
        assert_eq!(body.embeddings[1], engine.embed_one(&texts[1]));
    }

    assert_eq!(metrics.requests_total("POST", "/embeddings", 200), 100);
    assert_eq!(metrics.duration_count("POST", "/embeddings", 200), 100);
    assert_eq!(metrics.in_progress("POST", "/embeddings"), 0);
    assert_eq!(engine.calls(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_spawned_requests_share_counters() {
    let state = ready_state(stub_engine("stub"), Tier::Fallback);
    let metrics = state.metrics.clone();
    let app = create_app(state, None);

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { send(app, get("/health")).await.status })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }
    assert_eq!(metrics.requests_total("GET", "/health", 200), 50);
    assert_eq!(metrics.in_progress("GET", "/health"), 0);
}
