// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX Embedding Model Wrapper
//!
//! Wraps ONNX Runtime to run sentence-transformer style exports
//! (BAAI/bge-small-en-v1.5 by default).
//!
//! Features:
//! - Artifact resolution from a local directory or the HuggingFace Hub
//! - One session per hardware tier (CUDA, or CPU)
//! - Tokenization with truncation at the configured max length
//! - Batched inference in `batch_size` chunks
//! - CLS or attention-masked mean pooling, then L2 normalization

use crate::config::{EmbedConfig, EmbedType};
use crate::embeddings::artifacts::{self, ModelArtifacts};
use crate::embeddings::{EmbeddingEngine, EngineError, EngineInitError, EngineLoader, Tier};
use ndarray::{Array2, ArrayViewD, Axis};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokenizers::{Encoding, Tokenizer, TruncationParams};
use tracing::{debug, info};

const PASSAGE_PREFIX: &str = "passage: ";
const VALIDATION_TEXT: &str = "validation test";

/// How token embeddings are reduced to one sentence vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pooling {
    /// First token (`[CLS]`) embedding
    Cls,
    /// Average over non-padding tokens
    Mean,
}

impl Pooling {
    /// BGE-family models are trained for CLS pooling; everything else gets mean pooling.
    pub fn for_model(model_name: &str) -> Self {
        if model_name.to_ascii_lowercase().contains("bge") {
            Pooling::Cls
        } else {
            Pooling::Mean
        }
    }
}

/// ONNX-based embedding engine bound to one tier
///
/// The session is behind a mutex: ONNX Runtime sessions need `&mut` to run.
pub struct OnnxEmbeddingModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    model_name: String,
    tier: Tier,
    dimension: usize,
    pooling: Pooling,
    doc_embed_type: EmbedType,
    batch_size: usize,
    uses_token_type_ids: bool,
}

impl fmt::Debug for OnnxEmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxEmbeddingModel")
            .field("model_name", &self.model_name)
            .field("tier", &self.tier)
            .field("dimension", &self.dimension)
            .field("pooling", &self.pooling)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl OnnxEmbeddingModel {
    /// Resolves artifacts and builds the model on `tier`.
    ///
    /// # Errors
    /// - artifacts cannot be found or downloaded
    /// - the tier's execution provider cannot be registered (e.g. no CUDA driver)
    /// - the tokenizer cannot be loaded
    /// - the validation inference fails or yields an empty vector
    pub fn load(config: &EmbedConfig, tier: Tier) -> Result<Self, EngineInitError> {
        let ModelArtifacts {
            model_path,
            tokenizer_path,
        } = artifacts::resolve(&config.model_name, &config.cache_dir)?;

        Self::from_files(config, tier, &model_path, &tokenizer_path)
    }

    /// Builds the model from explicit file paths
    pub fn from_files(
        config: &EmbedConfig,
        tier: Tier,
        model_path: &Path,
        tokenizer_path: &Path,
    ) -> Result<Self, EngineInitError> {
        info!(
            "🚀 Initializing ONNX embedding model with {}",
            tier.execution_provider()
        );
        let session = build_session(model_path, config, tier)?;
        let uses_token_type_ids = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EngineInitError::Tokenizer(e.to_string()))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_length,
                ..Default::default()
            }))
            .map_err(|e| EngineInitError::Tokenizer(e.to_string()))?;
        tokenizer.with_padding(None);

        let mut model = Self {
            session: Mutex::new(session),
            tokenizer,
            model_name: config.model_name.clone(),
            tier,
            dimension: 0,
            pooling: Pooling::for_model(&config.model_name),
            doc_embed_type: config.doc_embed_type,
            batch_size: config.batch_size,
            uses_token_type_ids,
        };

        // Validation inference discovers the output dimension
        let sample = model
            .infer(&[VALIDATION_TEXT.to_string()])
            .map_err(|e| EngineInitError::Validation(e.to_string()))?;
        model.dimension = match sample.first().map(Vec::len) {
            Some(dimension) if dimension > 0 => dimension,
            _ => {
                return Err(EngineInitError::Validation(
                    "model produced an empty embedding".to_string(),
                ))
            }
        };

        info!(
            "✅ ONNX embedding model loaded ({} dimensions, {:?} pooling)",
            model.dimension, model.pooling
        );
        Ok(model)
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Runs one padded batch through the session
    fn infer(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(prepare_inputs(texts, self.doc_embed_type), true)
            .map_err(|e| EngineError::Tokenization(e.to_string()))?;
        let batch = BatchTensors::from_encodings(&encodings)?;

        let input_ids = Value::from_array(batch.input_ids).map_err(inference_error)?;
        let attention_mask =
            Value::from_array(batch.attention_mask.clone()).map_err(inference_error)?;

        // A panic mid-run leaves nothing in the session to repair
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);

        let outputs = if self.uses_token_type_ids {
            let token_type_ids = Value::from_array(batch.token_type_ids).map_err(inference_error)?;
            session
                .run(ort::inputs![
                    "input_ids" => input_ids,
                    "attention_mask" => attention_mask,
                    "token_type_ids" => token_type_ids
                ])
                .map_err(inference_error)?
        } else {
            session
                .run(ort::inputs![
                    "input_ids" => input_ids,
                    "attention_mask" => attention_mask
                ])
                .map_err(inference_error)?
        };

        // Use index [0]: output names differ between exports
        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(inference_error)?;

        let pooled = pool(output, &batch.attention_mask, self.pooling)?;
        Ok(pooled.into_iter().map(l2_normalize).collect())
    }
}

impl EmbeddingEngine for OnnxEmbeddingModel {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size.max(1)) {
            debug!("Embedding chunk of {} texts on {} tier", chunk.len(), self.tier);
            embeddings.extend(self.infer(chunk)?);
        }

        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(EngineError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }
        Ok(embeddings)
    }
}

/// Builds [`OnnxEmbeddingModel`]s for the engine initializer
#[derive(Debug, Clone, Copy, Default)]
pub struct OnnxLoader;

impl EngineLoader for OnnxLoader {
    fn load(
        &self,
        config: &EmbedConfig,
        tier: Tier,
    ) -> Result<Arc<dyn EmbeddingEngine>, EngineInitError> {
        Ok(Arc::new(OnnxEmbeddingModel::load(config, tier)?))
    }
}

fn build_session(
    model_path: &Path,
    config: &EmbedConfig,
    tier: Tier,
) -> Result<Session, EngineInitError> {
    let session_err = |e: String| EngineInitError::Session { tier, reason: e };

    // The CUDA provider must error instead of silently running on CPU,
    // otherwise the accelerated tier would never fail.
    let provider = match tier {
        Tier::Accelerated => CUDAExecutionProvider::default().build().error_on_failure(),
        Tier::Fallback => CPUExecutionProvider::default().build(),
    };

    let mut builder = Session::builder()
        .map_err(|e| session_err(e.to_string()))?
        .with_execution_providers([provider])
        .map_err(|e| session_err(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| session_err(e.to_string()))?;

    if let Some(threads) = config.threads {
        builder = builder
            .with_intra_threads(threads)
            .map_err(|e| session_err(e.to_string()))?;
    }
    if let Some(parallel) = config.parallel {
        builder = builder
            .with_parallel_execution(parallel > 1)
            .map_err(|e| session_err(e.to_string()))?
            .with_inter_threads(parallel)
            .map_err(|e| session_err(e.to_string()))?;
    }

    builder.commit_from_file(model_path).map_err(|e| {
        session_err(format!(
            "failed to load ONNX model from {}: {}",
            model_path.display(),
            e
        ))
    })
}

/// Applies the document embedding type to raw inputs
fn prepare_inputs(texts: &[String], embed_type: EmbedType) -> Vec<String> {
    match embed_type {
        EmbedType::Default => texts.to_vec(),
        EmbedType::Passage => texts
            .iter()
            .map(|text| format!("{}{}", PASSAGE_PREFIX, text))
            .collect(),
    }
}

fn inference_error(e: impl fmt::Display) -> EngineError {
    EngineError::Inference(e.to_string())
}

/// Tokenizer output for one input: ids, attention mask, type ids
type TokenRow<'a> = (&'a [u32], &'a [u32], &'a [u32]);

/// Right-padded `[batch, seq_len]` input tensors
#[derive(Debug)]
struct BatchTensors {
    input_ids: Array2<i64>,
    attention_mask: Array2<i64>,
    token_type_ids: Array2<i64>,
}

impl BatchTensors {
    fn from_encodings(encodings: &[Encoding]) -> Result<Self, EngineError> {
        let rows: Vec<TokenRow<'_>> = encodings
            .iter()
            .map(|enc| (enc.get_ids(), enc.get_attention_mask(), enc.get_type_ids()))
            .collect();
        Self::from_rows(&rows)
    }

    /// Pads every row to the longest one; padding has id 0 and mask 0.
    fn from_rows(rows: &[TokenRow<'_>]) -> Result<Self, EngineError> {
        let batch_size = rows.len();
        let max_len = rows.iter().map(|(ids, _, _)| ids.len()).max().unwrap_or(0);

        let mut input_ids = Array2::<i64>::zeros((batch_size, max_len));
        let mut attention_mask = Array2::<i64>::zeros((batch_size, max_len));
        let mut token_type_ids = Array2::<i64>::zeros((batch_size, max_len));

        for (row, (ids, mask, type_ids)) in rows.iter().enumerate() {
            for col in 0..ids.len() {
                input_ids[[row, col]] = ids[col] as i64;
                attention_mask[[row, col]] = mask.get(col).copied().unwrap_or(1) as i64;
                token_type_ids[[row, col]] = type_ids.get(col).copied().unwrap_or(0) as i64;
            }
        }

        if max_len == 0 {
            return Err(EngineError::Tokenization(
                "tokenizer produced no tokens".to_string(),
            ));
        }

        Ok(Self {
            input_ids,
            attention_mask,
            token_type_ids,
        })
    }
}

/// Reduces model output to one vector per batch row.
///
/// Accepts `[batch, hidden]` (already pooled) or `[batch, seq_len, hidden]`.
fn pool(
    output: ArrayViewD<'_, f32>,
    attention_mask: &Array2<i64>,
    pooling: Pooling,
) -> Result<Vec<Vec<f32>>, EngineError> {
    let batch_size = attention_mask.nrows();
    let shape = output.shape().to_vec();
    if shape.first().copied() != Some(batch_size) {
        return Err(EngineError::Inference(format!(
            "unexpected output shape {:?} for batch of {}",
            shape, batch_size
        )));
    }

    if shape.len() == 3 && shape[1] != attention_mask.ncols() {
        return Err(EngineError::Inference(format!(
            "output sequence length {} does not match input length {}",
            shape[1],
            attention_mask.ncols()
        )));
    }

    match shape.len() {
        2 => Ok(output
            .axis_iter(Axis(0))
            .map(|row| row.iter().copied().collect())
            .collect()),
        3 => {
            let hidden_dim = shape[2];
            let mut embeddings = Vec::with_capacity(batch_size);
            for (batch_idx, item) in output.axis_iter(Axis(0)).enumerate() {
                // item: [seq_len, hidden_dim]
                let pooled = match pooling {
                    Pooling::Cls => item.index_axis(Axis(0), 0).iter().copied().collect(),
                    Pooling::Mean => {
                        let mut pooled = vec![0.0f32; hidden_dim];
                        let mut sum_mask = 0.0f32;
                        for (token_idx, token) in item.axis_iter(Axis(0)).enumerate() {
                            let mask_value = attention_mask[[batch_idx, token_idx]] as f32;
                            sum_mask += mask_value;
                            for (j, value) in token.iter().enumerate() {
                                pooled[j] += value * mask_value;
                            }
                        }
                        for val in &mut pooled {
                            *val /= sum_mask.max(1e-9);
                        }
                        pooled
                    }
                };
                embeddings.push(pooled);
            }
            Ok(embeddings)
        }
        _ => Err(EngineError::Inference(format!(
            "unexpected output rank {} (shape {:?})",
            shape.len(),
            shape
        ))),
    }
}

fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}
