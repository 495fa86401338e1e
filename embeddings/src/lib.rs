//! # Embeddings
//!
//! Turns medical report text into dense vectors for retrieval.
//!
//! ## Features
//!
//! - **Provider cascade**: local embedding server, in-process model pipeline,
//!   hosted inference API
//! - **Caching**: bounded LRU caches keyed by model and content digest
//! - **Validation**: structural checks and dimension fitting for vectors
//! - **Voice path**: a separate, latency-bounded orchestrator with pre-warm
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingOrchestrator ──► EmbeddingCache (general)             │
//! │  VoiceEmbeddingOrchestrator ──► EmbeddingCache (voice)          │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  EmbeddingServerProvider / LocalModelProvider /                 │
//! │  HostedInferenceProvider                                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod hashing;
pub mod orchestrator;
pub mod provider;
pub mod similarity;
pub mod validate;
pub mod voice;

#[cfg(test)]
mod test_support;

pub use cache::{BoundedCache, CacheStats, EmbeddingCache};
pub use config::EmbeddingConfig;
pub use error::{EmbeddingError, Result};
pub use hashing::{cache_key, content_hash};
pub use orchestrator::EmbeddingOrchestrator;
pub use provider::{
    EmbeddingProvider, EmbeddingServerProvider, FeatureExtractionPipeline,
    HostedInferenceProvider, LocalModelProvider, PipelineLoader, PipelineOutput, Pooling,
    PoolingOptions,
};
pub use similarity::cosine_similarity;
pub use validate::{fit_to_dimension, is_valid_vector, MIN_VECTOR_LEN};
pub use voice::{PrewarmReport, VoiceEmbeddingOrchestrator, COMMON_VOICE_QUERIES};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Default embedding model identifier (all-MiniLM-L6-v2, 384 dimensions).
pub const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Dimension produced by [`DEFAULT_MODEL`].
pub const DEFAULT_DIMENSION: usize = 384;
