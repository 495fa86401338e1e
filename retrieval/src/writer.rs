//! Chunk, embed and store reports in the vector index.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use medrag_embeddings::{Embedding, EmbeddingOrchestrator, fit_to_dimension, is_valid_vector};

use crate::chunker::{Chunk, chunk_report};
use crate::error::{Result, RetrievalError};
use crate::index::{VectorIndex, VectorRecord};

/// Writes report chunks and their embeddings into one namespace.
pub struct ReportIndexer {
    orchestrator: Arc<EmbeddingOrchestrator>,
    index: Arc<dyn VectorIndex>,
    namespace: String,
    dimension: usize,
    chunk_size: usize,
    model: String,
}

impl ReportIndexer {
    /// Create an indexer.
    pub fn new(
        orchestrator: Arc<EmbeddingOrchestrator>,
        index: Arc<dyn VectorIndex>,
        namespace: impl Into<String>,
        dimension: usize,
        chunk_size: usize,
        model: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            index,
            namespace: namespace.into(),
            dimension,
            chunk_size,
            model: model.into(),
        }
    }

    /// Store `report_data` under `report_id`.
    ///
    /// Returns `false` when the report produced no chunks, when the index
    /// accepted none of them or when any step failed; failures are logged,
    /// never returned.
    pub async fn create_and_store_vector_embeddings(&self, report_data: &str, report_id: &str) -> bool {
        let chunks = chunk_report(report_data, report_id, self.chunk_size);
        if chunks.is_empty() {
            info!("Report {report_id} produced no chunks, nothing stored");
            return false;
        }

        match self.store_chunks(chunks, report_id).await {
            Ok(0) => {
                warn!("Index accepted no records for report {report_id}");
                false
            }
            Ok(stored) => {
                info!("Stored {stored} chunks for report {report_id}");
                true
            }
            Err(err) => {
                error!("Failed to store embeddings for report {report_id}: {err}");
                false
            }
        }
    }

    /// Store `report_data` under `report_id`, returning the number of records written.
    pub async fn try_store(&self, report_data: &str, report_id: &str) -> Result<usize> {
        let chunks = chunk_report(report_data, report_id, self.chunk_size);
        if chunks.is_empty() {
            return Ok(0);
        }
        self.store_chunks(chunks, report_id).await
    }

    async fn store_chunks(&self, chunks: Vec<Chunk>, report_id: &str) -> Result<usize> {
        debug!("Report {report_id} split into {} chunks", chunks.len());

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let vectors = self
            .orchestrator
            .embed_with_fallback(&texts, &self.model)
            .await?;

        let mut records = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            let vector = self.sanitize(chunk.index, &chunk.content, vector).await?;
            let values = fit_to_dimension(vector, self.dimension);
            records.push(VectorRecord::from_chunk(chunk, values));
        }

        self.index.upsert(&self.namespace, records).await
    }

    async fn sanitize(&self, chunk_index: usize, text: &str, vector: Embedding) -> Result<Embedding> {
        if is_valid_vector(Some(vector.as_slice())) {
            return Ok(vector);
        }

        warn!("Chunk {chunk_index} has an invalid embedding, recomputing");
        self.orchestrator
            .recompute_authoritative(text, &self.model)
            .await
            .map_err(|source| RetrievalError::InvalidVector {
                chunk_index,
                source,
            })
    }
}
