//! Error types for report storage and retrieval.

use medrag_embeddings::EmbeddingError;
use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur while storing or querying reports.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// A chunk's vector stayed invalid after recomputation.
    #[error("chunk {chunk_index} has no valid embedding: {source}")]
    InvalidVector {
        chunk_index: usize,
        source: EmbeddingError,
    },

    /// Vector index rejected or failed a request.
    #[error("vector index error: {0}")]
    Index(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
