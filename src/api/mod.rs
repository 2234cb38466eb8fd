// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod embed;
pub mod errors;
pub mod handlers;
pub mod http_server;

pub use embed::{embed, embed_handler, EmbedRequest, EmbedResponse, MODEL_NOT_LOADED};
pub use errors::{ApiError, ApiErrorResponse, ErrorResponse};
pub use handlers::HealthResponse;
pub use http_server::{
    api_routes, create_app, routes_with_body_limit, start_server, with_middleware, AppState,
    DEFAULT_MAX_BODY_BYTES,
};
