// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Embedding engine configuration
//!
//! Resolved once at startup from the process environment. Every option has a
//! default; malformed numeric values fail startup with [`ConfigError`]. The
//! document embedding type is the one exception: unknown values are clamped
//! to [`EmbedType::Default`].

use std::env;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

pub const ENV_MODEL: &str = "EMBED_MODEL";
pub const ENV_MAX_LENGTH: &str = "EMBED_MAX_LENGTH";
pub const ENV_CACHE_DIR: &str = "EMBED_CACHE_DIR";
pub const ENV_THREADS: &str = "EMBED_THREADS";
pub const ENV_DOC_EMBED_TYPE: &str = "EMBED_DOC_EMBED_TYPE";
pub const ENV_BATCH_SIZE: &str = "EMBED_BATCH_SIZE";
pub const ENV_PARALLEL: &str = "EMBED_PARALLEL";

pub const DEFAULT_MODEL: &str = "BAAI/bge-small-en-v1.5";
pub const DEFAULT_MAX_LENGTH: usize = 512;
pub const DEFAULT_CACHE_DIR: &str = "./model_cache";
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Startup configuration errors. Always fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidInteger { var: &'static str, value: String },

    #[error("{var} must be greater than 0")]
    ZeroValue { var: &'static str },

    #[error("{var} must not be empty")]
    Empty { var: &'static str },
}

/// How documents are prepared before embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedType {
    #[default]
    Default,
    /// Inputs are prefixed with `passage: ` (E5-style document encoding)
    Passage,
}

impl EmbedType {
    /// Parses a configured value, clamping anything unrecognized to `Default`.
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "default" => EmbedType::Default,
            "passage" => EmbedType::Passage,
            other => {
                warn!(
                    "Unrecognized {} value {:?}, using \"default\"",
                    ENV_DOC_EMBED_TYPE, other
                );
                EmbedType::Default
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedType::Default => "default",
            EmbedType::Passage => "passage",
        }
    }
}

impl fmt::Display for EmbedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable engine settings shared by every tier attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedConfig {
    /// HuggingFace repo id, or a local directory holding `model.onnx` and `tokenizer.json`
    pub model_name: String,
    /// Tokenizer truncation length
    pub max_length: usize,
    /// Where downloaded model artifacts live
    pub cache_dir: PathBuf,
    /// Intra-op threads; `None` leaves the runtime default
    pub threads: Option<usize>,
    pub doc_embed_type: EmbedType,
    /// Inputs per inference call
    pub batch_size: usize,
    /// Inter-op threads; `None` leaves the runtime default
    pub parallel: Option<usize>,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            max_length: DEFAULT_MAX_LENGTH,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            threads: None,
            doc_embed_type: EmbedType::Default,
            batch_size: DEFAULT_BATCH_SIZE,
            parallel: None,
        }
    }
}

impl EmbedConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let model_name = get(ENV_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let max_length = parse_positive(ENV_MAX_LENGTH, get(ENV_MAX_LENGTH))?
            .unwrap_or(DEFAULT_MAX_LENGTH);
        let cache_dir = get(ENV_CACHE_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));
        let threads = parse_positive(ENV_THREADS, get(ENV_THREADS))?;
        let doc_embed_type = get(ENV_DOC_EMBED_TYPE)
            .map(|v| EmbedType::parse_or_default(&v))
            .unwrap_or_default();
        let batch_size = parse_positive(ENV_BATCH_SIZE, get(ENV_BATCH_SIZE))?
            .unwrap_or(DEFAULT_BATCH_SIZE);
        let parallel = parse_positive(ENV_PARALLEL, get(ENV_PARALLEL))?;

        let config = Self {
            model_name,
            max_length,
            cache_dir,
            threads,
            doc_embed_type,
            batch_size,
            parallel,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model_name.trim().is_empty() {
            return Err(ConfigError::Empty { var: ENV_MODEL });
        }
        if self.max_length == 0 {
            return Err(ConfigError::ZeroValue {
                var: ENV_MAX_LENGTH,
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroValue {
                var: ENV_BATCH_SIZE,
            });
        }
        Ok(())
    }
}

fn parse_positive(var: &'static str, raw: Option<String>) -> Result<Option<usize>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value: usize = raw.parse().map_err(|_| ConfigError::InvalidInteger {
        var,
        value: raw.clone(),
    })?;
    if value == 0 {
        return Err(ConfigError::ZeroValue { var });
    }
    Ok(Some(value))
}
