//! Configuration for chunking, storage and retrieval.

use serde::{Deserialize, Serialize};

use medrag_embeddings::{DEFAULT_DIMENSION, EmbeddingConfig};

use crate::error::{Result, RetrievalError};

/// Default vector index namespace for medical reports.
pub const DEFAULT_NAMESPACE: &str = "medical-reports";

/// Configuration for the report store and its readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Namespace inside the vector index.
    pub namespace: String,

    /// Dimensionality of vectors stored in the index.
    pub dimension: usize,

    /// Number of results returned when the caller does not ask for a count.
    pub default_top_k: usize,

    /// Ceiling on the number of results for general queries.
    pub max_top_k: usize,

    /// Minimum relevance score (0.0 to 1.0).
    pub min_score: f32,

    /// Maximum chunk length in characters.
    pub chunk_size: usize,

    /// Capacity of the general query-result cache.
    pub query_cache_max_entries: usize,

    /// Capacity of the voice query-result cache.
    pub voice_query_cache_max_entries: usize,

    /// Host of the hosted vector index, if any.
    pub index_host: Option<String>,

    /// Credential for the hosted vector index.
    #[serde(skip_serializing)]
    pub index_api_key: Option<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            dimension: DEFAULT_DIMENSION,
            default_top_k: 5,
            max_top_k: 10,
            min_score: 0.7,
            chunk_size: 1000,
            query_cache_max_entries: 200,
            voice_query_cache_max_entries: 50,
            index_host: None,
            index_api_key: None,
        }
    }
}

impl RetrievalConfig {
    /// Build a configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(namespace) = env_var("VECTOR_NAMESPACE") {
            config.namespace = namespace;
        }
        if let Some(dimension) = parse_env("VECTOR_INDEX_DIMENSION")? {
            config.dimension = dimension;
        }
        if let Some(top_k) = parse_env("VECTOR_TOP_K")? {
            config.default_top_k = top_k;
        }
        config.index_host = env_var("PINECONE_INDEX_HOST");
        config.index_api_key = env_var("PINECONE_API_KEY");

        Ok(config)
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the index dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set the default and maximum result counts.
    pub fn with_top_k(mut self, default_top_k: usize, max_top_k: usize) -> Self {
        self.default_top_k = default_top_k;
        self.max_top_k = max_top_k;
        self
    }

    /// Set the minimum relevance score.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Set the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Point at a hosted vector index.
    pub fn with_index(mut self, host: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.index_host = Some(host.into());
        self.index_api_key = Some(api_key.into());
        self
    }
}

/// Everything needed to assemble an [`crate::EmbeddingService`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Storage and retrieval configuration.
    pub retrieval: RetrievalConfig,
}

impl PipelineConfig {
    /// Create a pipeline configuration from its parts.
    pub fn new(embedding: EmbeddingConfig, retrieval: RetrievalConfig) -> Self {
        Self {
            embedding,
            retrieval,
        }
    }

    /// Build both halves from process environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(EmbeddingConfig::from_env()?, RetrievalConfig::from_env()?))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env(name: &str) -> Result<Option<usize>> {
    env_var(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| RetrievalError::Config(format!("invalid value for {name}: {raw:?}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = RetrievalConfig::default();
        assert_eq!(config.namespace, "medical-reports");
        assert_eq!(config.dimension, 384);
        assert_eq!(config.default_top_k, 5);
        assert_eq!(config.max_top_k, 10);
        assert_eq!(config.min_score, 0.7);
        assert_eq!(config.chunk_size, 1000);
        assert!(config.index_host.is_none());
    }

    #[test]
    fn test_builders() {
        let config = RetrievalConfig::default()
            .with_namespace("test")
            .with_dimension(16)
            .with_top_k(2, 4)
            .with_index("https://idx.example", "key");

        assert_eq!(config.namespace, "test");
        assert_eq!(config.dimension, 16);
        assert_eq!((config.default_top_k, config.max_top_k), (2, 4));
        assert_eq!(config.index_host.as_deref(), Some("https://idx.example"));
    }

    #[test]
    fn test_api_key_not_serialized() {
        let config = RetrievalConfig::default().with_index("https://idx.example", "secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
