// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding API Module
//!
//! POST /embeddings: turns a list of texts into one vector per text using
//! the engine acquired at startup.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{embed, embed_handler, MODEL_NOT_LOADED};
pub use request::EmbedRequest;
pub use response::EmbedResponse;
