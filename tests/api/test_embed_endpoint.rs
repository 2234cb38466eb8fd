// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /embeddings through the full router

use super::support::*;
use axum::http::StatusCode;
use axum::{body::Body, http::Request};
use fabstir_embed_node::api::{
    create_app, routes_with_body_limit, with_middleware, EmbedResponse, MODEL_NOT_LOADED,
};
use fabstir_embed_node::embeddings::{MockBehavior, StubEmbeddingEngine, Tier};
use fabstir_embed_node::monitoring::REQUEST_ID_HEADER;
use std::sync::Arc;

#[tokio::test]
async fn test_one_vector_per_text_in_order() {
    let engine = stub_engine("BAAI/bge-small-en-v1.5");
    let app = create_app(ready_state(engine.clone(), Tier::Accelerated), None);

    let texts = ["first document", "second document", "third document"];
    let response = send(app, embed_request(&texts)).await;
    assert_eq!(response.status, StatusCode::OK);

    let body: EmbedResponse = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body.embeddings.len(), texts.len());
    for (text, vector) in texts.iter().zip(&body.embeddings) {
        assert_eq!(vector.len(), DIMENSION);
        assert_eq!(vector, &engine.embed_one(text));
    }
}

#[tokio::test]
async fn test_empty_texts_returns_empty_list() {
    let engine = stub_engine("stub");
    let app = create_app(ready_state(engine.clone(), Tier::Fallback), None);

    let response = send(app, embed_request(&[])).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), serde_json::json!({"embeddings": []}));
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_unavailable_engine_returns_503_for_any_input() {
    let app = create_app(unavailable_state(), None);

    for texts in [vec![], vec!["a"], vec!["a", "b", "c"]] {
        let response = send(app.clone(), embed_request(&texts)).await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);

        let body = response.json();
        assert_eq!(body["error_type"], "service_unavailable");
        assert_eq!(body["message"], MODEL_NOT_LOADED);

        // The error body carries the same correlation id as the header
        let header = response.headers[REQUEST_ID_HEADER].to_str().unwrap();
        assert_eq!(body["request_id"], header);
    }
}

#[tokio::test]
async fn test_engine_failure_returns_500_with_message() {
    let engine = Arc::new(StubEmbeddingEngine::with_behavior(
        "stub",
        DIMENSION,
        MockBehavior::Fail("CUDA out of memory".to_string()),
    ));
    let app = create_app(ready_state(engine, Tier::Accelerated), None);

    let response = send(app, embed_request(&["x"])).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = response.json()["message"].as_str().unwrap().to_string();
    assert!(message.starts_with("Error generating embeddings: "));
    assert!(message.contains("CUDA out of memory"));
}

#[tokio::test]
async fn test_short_engine_output_is_not_returned_partially() {
    let engine = Arc::new(StubEmbeddingEngine::with_behavior(
        "stub",
        DIMENSION,
        MockBehavior::Truncate,
    ));
    let app = create_app(ready_state(engine, Tier::Accelerated), None);

    let response = send(app, embed_request(&["a", "b", "c"])).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.json().get("embeddings").is_none());
}

#[tokio::test]
async fn test_engine_panic_returns_500() {
    let engine = Arc::new(StubEmbeddingEngine::with_behavior(
        "stub",
        DIMENSION,
        MockBehavior::Panic,
    ));
    let app = create_app(ready_state(engine, Tier::Accelerated), None);

    let response = send(app, embed_request(&["x"])).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["error_type"], "internal_error");
}

#[tokio::test]
async fn test_malformed_bodies_return_400() {
    let engine = stub_engine("stub");
    let app = create_app(ready_state(engine.clone(), Tier::Accelerated), None);

    for body in [
        "not json",
        "{}",
        r#"{"texts": "single string"}"#,
        r#"{"texts": [1, 2, 3]}"#,
    ] {
        let response = send(app.clone(), post_raw("/embeddings", body)).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(response.json()["error_type"], "invalid_request");
    }
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_wrong_method_is_not_served() {
    let app = create_app(ready_state(stub_engine("stub"), Tier::Accelerated), None);

    let response = send(app, get("/embeddings")).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_batch_larger_than_two_megabytes_is_accepted() {
    let engine = stub_engine("stub");
    let app = create_app(ready_state(engine.clone(), Tier::Accelerated), None);

    let texts = large_batch(5000, 500);
    let body = serde_json::json!({ "texts": texts }).to_string();
    assert!(body.len() > 2 * 1024 * 1024);

    let response = send(app, post_raw("/embeddings", body)).await;
    assert_eq!(response.status, StatusCode::OK);
    let body: EmbedResponse = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body.embeddings.len(), 5000);
    assert_eq!(body.embeddings[4999], engine.embed_one(&texts[4999]));
}

#[tokio::test]
async fn test_body_over_configured_limit_returns_413() {
    let engine = stub_engine("stub");
    let app = with_middleware(
        routes_with_body_limit(1024),
        ready_state(engine.clone(), Tier::Accelerated),
        None,
    );

    let texts = large_batch(10, 200);
    let body = serde_json::json!({ "texts": texts }).to_string();
    let response = send(app, post_raw("/embeddings", body)).await;
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.json()["error_type"], "payload_too_large");
    assert!(response.headers.contains_key(REQUEST_ID_HEADER));
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_missing_content_type_returns_415() {
    let engine = stub_engine("stub");
    let app = create_app(ready_state(engine.clone(), Tier::Accelerated), None);

    let request = Request::builder()
        .method("POST")
        .uri("/embeddings")
        .body(Body::from(r#"{"texts": ["hello"]}"#))
        .unwrap();
    let response = send(app, request).await;
    assert_eq!(response.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(response.json()["error_type"], "unsupported_media_type");
    assert_eq!(engine.calls(), 0);
}
