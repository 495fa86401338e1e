//! In-process vector index.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use medrag_embeddings::EmbeddingError;
use medrag_embeddings::similarity::find_top_k;

use super::{QueryMatch, QueryRequest, QueryResponse, VectorIndex, VectorRecord};
use crate::error::Result;

struct StoredRecord {
    record: VectorRecord,
    metadata: serde_json::Value,
}

/// A namespaced vector index held in memory, ranked by cosine similarity.
///
/// Useful for local development and tests; contents are lost on drop.
pub struct InMemoryIndex {
    namespaces: RwLock<HashMap<String, HashMap<String, StoredRecord>>>,
    dimension: usize,
    queries: AtomicUsize,
}

impl InMemoryIndex {
    /// Create an empty index accepting vectors of `dimension` values.
    pub fn new(dimension: usize) -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
            dimension,
            queries: AtomicUsize::new(0),
        }
    }

    /// Number of records in `namespace`.
    pub async fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .map_or(0, HashMap::len)
    }

    /// Whether `namespace` holds no records.
    pub async fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace).await == 0
    }

    /// Fetch a record by id.
    pub async fn get(&self, namespace: &str, id: &str) -> Option<VectorRecord> {
        self.namespaces
            .read()
            .await
            .get(namespace)?
            .get(id)
            .map(|stored| stored.record.clone())
    }

    /// Sorted record ids in `namespace`.
    pub async fn ids(&self, namespace: &str) -> Vec<String> {
        let namespaces = self.namespaces.read().await;
        let mut ids: Vec<String> = namespaces
            .get(namespace)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Number of queries served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual,
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<usize> {
        // Validate the whole batch before touching stored state.
        let mut prepared = Vec::with_capacity(records.len());
        for record in records {
            self.check_dimension(record.values.len())?;
            let metadata = serde_json::to_value(&record.metadata)?;
            prepared.push(StoredRecord { record, metadata });
        }

        let written = prepared.len();
        let mut namespaces = self.namespaces.write().await;
        let entries = namespaces.entry(namespace.to_string()).or_default();
        for stored in prepared {
            entries.insert(stored.record.id.clone(), stored);
        }

        debug!("Upserted {written} records into {namespace}");
        Ok(written)
    }

    async fn query(&self, namespace: &str, request: QueryRequest) -> Result<QueryResponse> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.check_dimension(request.vector.len())?;

        let namespaces = self.namespaces.read().await;
        let Some(entries) = namespaces.get(namespace) else {
            return Ok(QueryResponse::default());
        };

        let candidates = entries
            .values()
            .filter(|stored| {
                request
                    .filter
                    .as_ref()
                    .is_none_or(|filter| filter.matches(&stored.metadata))
            })
            .map(|stored| (stored.record.id.as_str(), stored.record.values.as_slice()));
        let ranked = find_top_k(&request.vector, candidates, request.top_k)?;

        let matches = ranked
            .into_iter()
            .filter_map(|result| {
                let stored = entries.get(&result.id)?;
                Some(QueryMatch {
                    id: result.id,
                    score: result.score,
                    values: request.include_values.then(|| stored.record.values.clone()),
                    metadata: request.include_metadata.then(|| stored.metadata.clone()),
                })
            })
            .collect();

        Ok(QueryResponse { matches })
    }
}
