// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod embedding;
pub mod logging;

pub use embedding::{ConfigError, EmbedConfig, EmbedType};
pub use logging::{init_tracing, LogFormat};
