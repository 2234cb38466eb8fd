// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Model artifact resolution
//!
//! A model identifier is either a local directory holding the ONNX export and
//! `tokenizer.json`, or a HuggingFace repo id fetched into the cache directory.
//! The cache contents are owned by hf-hub; nothing here cleans or validates it.

use crate::embeddings::EngineInitError;
use hf_hub::api::sync::ApiBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// ONNX files to look for, in order of preference
pub const MODEL_FILE_CANDIDATES: &[&str] = &["onnx/model.onnx", "model.onnx", "model_optimized.onnx"];

pub const TOKENIZER_FILE: &str = "tokenizer.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifacts {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

/// Resolves the files for `model_name`, downloading them if needed.
pub fn resolve(model_name: &str, cache_dir: &Path) -> Result<ModelArtifacts, EngineInitError> {
    let local = Path::new(model_name);
    if local.is_dir() {
        return resolve_local(model_name, local);
    }
    download(model_name, cache_dir)
}

/// Resolves artifacts from a directory on disk
pub fn resolve_local(model_name: &str, dir: &Path) -> Result<ModelArtifacts, EngineInitError> {
    let model_path = MODEL_FILE_CANDIDATES
        .iter()
        .map(|candidate| dir.join(candidate))
        .find(|path| path.is_file())
        .ok_or_else(|| EngineInitError::Artifacts {
            model: model_name.to_string(),
            reason: format!("no ONNX model file found in {}", dir.display()),
        })?;

    let tokenizer_path = dir.join(TOKENIZER_FILE);
    if !tokenizer_path.is_file() {
        return Err(EngineInitError::Artifacts {
            model: model_name.to_string(),
            reason: format!("tokenizer file not found: {}", tokenizer_path.display()),
        });
    }

    debug!(
        "Using local model files {} and {}",
        model_path.display(),
        tokenizer_path.display()
    );
    Ok(ModelArtifacts {
        model_path,
        tokenizer_path,
    })
}

fn download(model_name: &str, cache_dir: &Path) -> Result<ModelArtifacts, EngineInitError> {
    let artifacts_err = |reason: String| EngineInitError::Artifacts {
        model: model_name.to_string(),
        reason,
    };

    std::fs::create_dir_all(cache_dir).map_err(|e| {
        artifacts_err(format!(
            "cannot create cache directory {}: {}",
            cache_dir.display(),
            e
        ))
    })?;

    info!(
        "Resolving model '{}' from HuggingFace Hub (cache: {})",
        model_name,
        cache_dir.display()
    );

    let api = ApiBuilder::new()
        .with_cache_dir(cache_dir.to_path_buf())
        .with_progress(false)
        .build()
        .map_err(|e| artifacts_err(e.to_string()))?;
    let repo = api.model(model_name.to_string());

    let mut last_error = String::from("no candidate files");
    let mut model_path = None;
    for candidate in MODEL_FILE_CANDIDATES {
        match repo.get(candidate) {
            Ok(path) => {
                model_path = Some(path);
                break;
            }
            Err(e) => {
                debug!("{} not available for {}: {}", candidate, model_name, e);
                last_error = e.to_string();
            }
        }
    }
    let model_path = model_path.ok_or_else(|| artifacts_err(last_error))?;

    let tokenizer_path = repo
        .get(TOKENIZER_FILE)
        .map_err(|e| artifacts_err(format!("{}: {}", TOKENIZER_FILE, e)))?;

    Ok(ModelArtifacts {
        model_path,
        tokenizer_path,
    })
}
