//! Embedding providers.
//!
//! Three interchangeable backends share the [`EmbeddingProvider`] contract:
//! a lightweight embedding server, an in-process model pipeline and a hosted
//! inference API. Providers never cache; that is the orchestrators' job.

mod hosted;
mod local;
mod server;

use async_trait::async_trait;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

pub use hosted::HostedInferenceProvider;
pub use local::{
    FeatureExtractionPipeline, LocalModelProvider, PipelineLoader, PipelineOutput, Pooling,
    PoolingOptions,
};
pub use server::EmbeddingServerProvider;

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Check if the provider is usable (credential set, loader present, ...).
    fn is_available(&self) -> bool;

    /// Embed `texts` with `model`.
    ///
    /// Returns exactly one vector per input, in input order.
    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Embedding>>;
}

/// Convert raw JSON numbers into an embedding, rejecting values that are not
/// finite once narrowed to `f32`.
pub(crate) fn finite_embedding(values: Vec<f64>, provider: &str) -> Result<Embedding> {
    let embedding: Embedding = values.into_iter().map(|v| v as f32).collect();
    ensure_finite(&embedding, provider)?;
    Ok(embedding)
}

pub(crate) fn ensure_finite(embedding: &[f32], provider: &str) -> Result<()> {
    if let Some(pos) = embedding.iter().position(|v| !v.is_finite()) {
        return Err(EmbeddingError::InvalidResponse(format!(
            "{provider} returned a non-finite value at position {pos}"
        )));
    }
    Ok(())
}

pub(crate) fn ensure_count(provider: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(EmbeddingError::InvalidResponse(format!(
            "{provider} returned {actual} embeddings for {expected} texts"
        )));
    }
    Ok(())
}
