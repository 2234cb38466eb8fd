// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Request body for POST /embeddings

use crate::api::ApiError;
use axum::{extract::rejection::JsonRejection, http::StatusCode};
use serde::{Deserialize, Serialize};

/// Request body for POST /embeddings
///
/// # Example
/// ```json
/// {
///   "texts": ["Hello world", "Another text"]
/// }
/// ```
///
/// An empty `texts` list is valid and yields an empty result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedRequest {
    pub texts: Vec<String>,
}

/// Maps a body extraction failure to an [`ApiError`], keeping the rejection's message.
///
/// Oversized bodies stay 413 and a missing JSON content type stays 415;
/// syntax and shape errors become 400.
pub fn rejection_to_error(rejection: JsonRejection) -> ApiError {
    let message = rejection.body_text();
    match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(message),
        StatusCode::UNSUPPORTED_MEDIA_TYPE => ApiError::UnsupportedMediaType(message),
        _ => ApiError::InvalidRequest(message),
    }
}
