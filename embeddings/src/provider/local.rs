//! In-process model pipeline provider.
//!
//! The model runtime itself (ONNX, candle, ...) lives behind
//! [`PipelineLoader`]; this adapter owns loading-once-per-model and turns
//! whatever shape the pipeline hands back into canonical embeddings.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{EmbeddingProvider, ensure_count, ensure_finite};
use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::similarity::normalize;

/// Pooling strategy requested from the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pooling {
    /// Average over token embeddings.
    Mean,
    /// Use the first (CLS) token.
    Cls,
    /// Return token-level output unpooled.
    None,
}

/// Options passed to a feature-extraction pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolingOptions {
    pub pooling: Pooling,
    pub normalize: bool,
}

impl Default for PoolingOptions {
    fn default() -> Self {
        Self {
            pooling: Pooling::Mean,
            normalize: true,
        }
    }
}

/// Raw pipeline output in any of the shapes a runtime may produce.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutput {
    /// One pooled vector.
    Single(Vec<f32>),
    /// One pooled vector per input.
    Batch(Vec<Vec<f32>>),
    /// Flat tensor data with its shape: `[dim]`, `[batch, dim]` or
    /// `[batch, tokens, dim]`.
    Tensor { data: Vec<f32>, dims: Vec<usize> },
}

/// A loaded feature-extraction model.
#[async_trait]
pub trait FeatureExtractionPipeline: Send + Sync {
    /// Run the model over `texts` in a single call.
    async fn extract(&self, texts: &[String], options: PoolingOptions) -> Result<PipelineOutput>;
}

/// Loads feature-extraction pipelines by model identifier.
#[async_trait]
pub trait PipelineLoader: Send + Sync {
    /// Load the pipeline for `model`.
    async fn load(&self, model: &str) -> Result<Arc<dyn FeatureExtractionPipeline>>;
}

/// Provider that runs the embedding model inside the process.
///
/// Independent of any network service, so it is also the authoritative
/// source when a vector from another provider has to be recomputed.
pub struct LocalModelProvider {
    loader: Arc<dyn PipelineLoader>,
    options: PoolingOptions,

    /// Pipelines that loaded successfully, by model id.
    pipelines: Mutex<HashMap<String, Arc<dyn FeatureExtractionPipeline>>>,
}

impl LocalModelProvider {
    /// Create a provider that loads models through `loader`.
    pub fn new(loader: Arc<dyn PipelineLoader>) -> Self {
        Self {
            loader,
            options: PoolingOptions::default(),
            pipelines: Mutex::new(HashMap::new()),
        }
    }

    /// Override the pooling options.
    pub fn with_options(mut self, options: PoolingOptions) -> Self {
        self.options = options;
        self
    }

    async fn pipeline(&self, model: &str) -> Result<Arc<dyn FeatureExtractionPipeline>> {
        // Held across the load so concurrent callers wait for one load.
        let mut pipelines = self.pipelines.lock().await;
        if let Some(pipeline) = pipelines.get(model) {
            return Ok(Arc::clone(pipeline));
        }

        info!("Loading in-process embedding model {model}");
        let pipeline = self.loader.load(model).await?;
        pipelines.insert(model.to_string(), Arc::clone(&pipeline));
        Ok(pipeline)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalModelProvider {
    fn name(&self) -> &str {
        "local-model"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let pipeline = self.pipeline(model).await?;
        debug!("Running in-process model {model} over {} texts", texts.len());
        let output = pipeline.extract(texts, self.options).await?;

        let embeddings = into_embeddings(output, texts.len(), self.options)?;
        for embedding in &embeddings {
            ensure_finite(embedding, self.name())?;
        }
        Ok(embeddings)
    }
}

/// Convert pipeline output into exactly `expected` embeddings.
///
/// Only token-level (`[batch, tokens, dim]`) output is pooled here; anything
/// the pipeline already pooled is taken as is.
fn into_embeddings(
    output: PipelineOutput,
    expected: usize,
    options: PoolingOptions,
) -> Result<Vec<Embedding>> {
    let embeddings = match output {
        PipelineOutput::Single(vector) => vec![vector],
        PipelineOutput::Batch(vectors) => vectors,
        PipelineOutput::Tensor { data, dims } => {
            let size: usize = dims.iter().product();
            if dims.is_empty() || dims.contains(&0) || size != data.len() {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "tensor of {} values does not match shape {dims:?}",
                    data.len()
                )));
            }
            match dims.as_slice() {
                [_] => vec![data],
                [_, dim] => data.chunks(*dim).map(<[f32]>::to_vec).collect(),
                [_, tokens, dim] => pool_tokens(&data, *tokens, *dim, options)?,
                _ => {
                    return Err(EmbeddingError::InvalidResponse(format!(
                        "unsupported tensor rank {}",
                        dims.len()
                    )));
                }
            }
        }
    };

    ensure_count("local-model", expected, embeddings.len())?;
    Ok(embeddings)
}

/// Reduce `[batch, tokens, dim]` data to one vector per batch item.
fn pool_tokens(
    data: &[f32],
    tokens: usize,
    dim: usize,
    options: PoolingOptions,
) -> Result<Vec<Embedding>> {
    let pool: fn(&[f32], usize, usize) -> Embedding = match options.pooling {
        Pooling::Mean => mean_over_tokens,
        Pooling::Cls => first_token,
        Pooling::None => {
            return Err(EmbeddingError::InvalidResponse(format!(
                "pipeline returned {tokens} token vectors per input but pooling is disabled"
            )));
        }
    };

    Ok(data
        .chunks(tokens * dim)
        .map(|item| {
            let mut pooled = pool(item, tokens, dim);
            if options.normalize {
                normalize(&mut pooled);
            }
            pooled
        })
        .collect())
}

fn mean_over_tokens(item: &[f32], tokens: usize, dim: usize) -> Embedding {
    let mut pooled = vec![0.0f32; dim];
    for token in item.chunks(dim) {
        for (acc, value) in pooled.iter_mut().zip(token) {
            *acc += value;
        }
    }
    let n = tokens.max(1) as f32;
    for value in &mut pooled {
        *value /= n;
    }
    pooled
}

fn first_token(item: &[f32], _tokens: usize, dim: usize) -> Embedding {
    item[..dim].to_vec()
}
