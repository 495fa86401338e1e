//! # Retrieval
//!
//! Stores medical reports in a vector index and retrieves the findings most
//! relevant to a question.
//!
//! - **Chunking**: sentence-aligned pieces of bounded length
//! - **Storage**: embeddings sanitized, fitted to the index dimension and
//!   upserted with chunk metadata
//! - **Retrieval**: filtered similarity search formatted as numbered findings,
//!   with separate result caches for chat and voice
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      EmbeddingService                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ReportIndexer ──► EmbeddingOrchestrator                        │
//! │  ReportRetriever ──► EmbeddingOrchestrator / Voice orchestrator │
//! │       │                   + query-result caches                 │
//! │       ▼                                                         │
//! │  VectorIndex (InMemoryIndex / PineconeIndex)                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medrag_retrieval::{EmbeddingService, PipelineConfig, QueryOptions};
//!
//! let service = EmbeddingService::builder(PipelineConfig::from_env()?).build()?;
//!
//! service.store_report(report_text, "report-42").await;
//! let findings = service
//!     .query("What is my cholesterol?", QueryOptions::for_report("report-42"))
//!     .await;
//! ```

pub mod chunker;
pub mod config;
pub mod error;
pub mod index;
pub mod reader;
pub mod service;
pub mod writer;

pub use chunker::{Chunk, DEFAULT_CHUNK_SIZE, chunk_report, split_text_into_chunks};
pub use config::{PipelineConfig, RetrievalConfig};
pub use error::{Result, RetrievalError};
pub use index::{
    InMemoryIndex, MetadataFilter, PineconeIndex, QueryMatch, QueryRequest, QueryResponse,
    RecordMetadata, VectorIndex, VectorRecord,
};
pub use reader::{NO_MATCHES, QueryOptions, ReportRetriever};
pub use service::{EmbeddingService, EmbeddingServiceBuilder, ServiceStats};
pub use writer::ReportIndexer;

// Re-export from dependencies for convenience
pub use medrag_embeddings::{EmbeddingConfig, EmbeddingProvider, PipelineLoader, PrewarmReport};
