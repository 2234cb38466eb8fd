// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /embeddings handler
//!
//! The handler only adapts HTTP to [`embed`]; everything observable about
//! the embedding operation (503 when no engine, empty short-circuit, 500 on
//! engine failure) lives in the service function so it can be tested
//! without a router.

use crate::api::embed::request::rejection_to_error;
use crate::api::embed::{EmbedRequest, EmbedResponse};
use crate::api::errors::{ApiError, ApiErrorResponse};
use crate::api::http_server::AppState;
use crate::embeddings::{panic_message, EngineError, EngineState};
use crate::monitoring::RequestId;
use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use std::time::Instant;
use tracing::{error, info};

pub const MODEL_NOT_LOADED: &str = "Embedding model not loaded.";

/// Computes embeddings for `texts` with whatever engine the process settled on.
///
/// # Errors
/// - [`ApiError::ServiceUnavailable`] when no engine was loaded at startup
/// - [`ApiError::InternalError`] when the engine fails, panics, or returns
///   a different number of vectors than inputs
pub async fn embed(
    engine: &EngineState,
    request_id: &str,
    texts: Vec<String>,
) -> Result<EmbedResponse, ApiError> {
    info!(
        request_id = %request_id,
        text_count = texts.len(),
        "Received embedding request for {} texts",
        texts.len()
    );

    let engine = match engine.engine() {
        Some(engine) => engine.clone(),
        None => {
            error!(request_id = %request_id, "Embedding model not loaded, rejecting request");
            return Err(ApiError::ServiceUnavailable(MODEL_NOT_LOADED.to_string()));
        }
    };

    if texts.is_empty() {
        return Ok(EmbedResponse::empty());
    }

    let started = Instant::now();
    let expected = texts.len();
    let result = tokio::task::spawn_blocking(move || engine.embed(&texts)).await;

    let failure = match result {
        Ok(Ok(embeddings)) if embeddings.len() == expected => {
            return Ok(EmbedResponse { embeddings });
        }
        Ok(Ok(embeddings)) => {
            let e = EngineError::CountMismatch {
                expected,
                actual: embeddings.len(),
            };
            (e.kind(), e.to_string())
        }
        Ok(Err(e)) => (e.kind(), e.to_string()),
        Err(join_error) if join_error.is_panic() => {
            ("panic", panic_message(join_error.into_panic().as_ref()))
        }
        Err(join_error) => ("cancelled", join_error.to_string()),
    };

    let (kind, message) = failure;
    error!(
        request_id = %request_id,
        error_type = kind,
        processing_time_s = format!("{:.4}", started.elapsed().as_secs_f64()),
        "Error generating embeddings: {}",
        message
    );
    Err(ApiError::InternalError(format!(
        "Error generating embeddings: {}",
        message
    )))
}

/// POST /embeddings handler
///
/// # Request Body
/// ```json
/// { "texts": ["text1", "text2"] }
/// ```
///
/// # Response Body
/// ```json
/// { "embeddings": [[0.1, 0.2, ...], [0.3, 0.4, ...]] }
/// ```
pub async fn embed_handler(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    payload: Result<Json<EmbedRequest>, JsonRejection>,
) -> Result<Json<EmbedResponse>, ApiErrorResponse> {
    let request_id = request_id
        .map(|Extension(id)| id)
        .unwrap_or_default()
        .to_string();

    let Json(request) = payload.map_err(|rejection| {
        rejection_to_error(rejection).with_request_id(Some(request_id.clone()))
    })?;

    embed(&state.engine, &request_id, request.texts)
        .await
        .map(Json)
        .map_err(|e| e.with_request_id(Some(request_id)))
}
