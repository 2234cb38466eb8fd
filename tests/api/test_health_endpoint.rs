// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

use super::support::*;
use axum::http::StatusCode;
use fabstir_embed_node::api::create_app;
use fabstir_embed_node::embeddings::Tier;

#[tokio::test]
async fn test_health_reports_loaded_model() {
    let app = create_app(
        ready_state(stub_engine("BAAI/bge-small-en-v1.5"), Tier::Accelerated),
        None,
    );

    let response = send(app, get("/health")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        serde_json::json!({
            "status": "ok",
            "model": "BAAI/bge-small-en-v1.5",
            "tier": "accelerated"
        })
    );
}

#[tokio::test]
async fn test_health_reports_null_model_when_unavailable() {
    let app = create_app(unavailable_state(), None);

    let response = send(app, get("/health")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        serde_json::json!({"status": "ok", "model": null})
    );
}

#[tokio::test]
async fn test_unknown_route_is_404_json() {
    let app = create_app(unavailable_state(), None);

    let response = send(app, get("/v1/embed")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["error_type"], "not_found");
}

#[tokio::test]
async fn test_metrics_endpoint_serves_text_format() {
    let state = ready_state(stub_engine("stub"), Tier::Fallback);
    state.metrics.record_engine_state(&state.engine);
    let app = create_app(state, None);

    for path in ["/metrics", "/metrics/"] {
        let response = send(app.clone(), get(path)).await;
        assert_eq!(response.status, StatusCode::OK);

        let content_type = response.headers["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("text/plain; version=0.0.4"));
        let text = response.text();
        assert!(text.contains("fastembed_engine_ready 1"));
        assert!(text.contains(r#"fastembed_engine_info{model="stub",tier="fallback"} 1"#));
    }
}
