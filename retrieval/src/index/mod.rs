//! Vector index abstraction and record types.

mod memory;
mod pinecone;

pub use memory::InMemoryIndex;
pub use pinecone::PineconeIndex;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use medrag_embeddings::Embedding;

use crate::chunker::Chunk;
use crate::error::Result;

/// Metadata stored alongside each report chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    /// Chunk text.
    pub text: String,

    /// Report the chunk belongs to.
    pub report_id: String,

    /// Position of the chunk within its report.
    pub chunk_index: usize,

    /// Number of chunks in the report.
    pub total_chunks: usize,

    /// RFC 3339 creation time.
    pub timestamp: String,
}

/// A vector plus metadata, as written to the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Record id, `{report_id}_chunk_{index}`.
    pub id: String,

    /// Embedding values.
    pub values: Embedding,

    /// Chunk metadata.
    pub metadata: RecordMetadata,
}

impl VectorRecord {
    /// Build the record for `chunk` with an already fitted vector.
    pub fn from_chunk(chunk: Chunk, values: Embedding) -> Self {
        Self {
            id: record_id(&chunk.report_id, chunk.index),
            values,
            metadata: RecordMetadata {
                text: chunk.content,
                report_id: chunk.report_id,
                chunk_index: chunk.index,
                total_chunks: chunk.total_chunks,
                timestamp: chunk.created_at.to_rfc3339(),
            },
        }
    }
}

/// Id of the `index`-th chunk of `report_id`.
pub fn record_id(report_id: &str, index: usize) -> String {
    format!("{report_id}_chunk_{index}")
}

/// Equality filter over metadata fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    equals: BTreeMap<String, Value>,
}

impl MetadataFilter {
    /// Create an empty filter that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Match only chunks of the given report.
    pub fn report(report_id: impl Into<String>) -> Self {
        Self::new().with_eq("reportId", report_id.into())
    }

    /// Require `field` to equal `value`.
    pub fn with_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.insert(field.into(), value.into());
        self
    }

    /// Whether `metadata` satisfies every condition.
    pub fn matches(&self, metadata: &Value) -> bool {
        self.equals
            .iter()
            .all(|(field, expected)| metadata.get(field) == Some(expected))
    }

    /// Render in the hosted index's filter syntax (`{"field": {"$eq": value}}`).
    pub fn to_query_json(&self) -> Value {
        Value::Object(
            self.equals
                .iter()
                .map(|(field, value)| (field.clone(), serde_json::json!({ "$eq": value })))
                .collect(),
        )
    }
}

/// A similarity query against one namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Query vector.
    pub vector: Embedding,

    /// Maximum number of matches.
    pub top_k: usize,

    /// Return stored metadata with each match.
    pub include_metadata: bool,

    /// Return stored values with each match.
    pub include_values: bool,

    /// Optional metadata filter.
    pub filter: Option<MetadataFilter>,
}

impl QueryRequest {
    /// Request `top_k` matches with metadata and without values.
    pub fn new(vector: Embedding, top_k: usize) -> Self {
        Self {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
            filter: None,
        }
    }

    /// Restrict matches with `filter`.
    pub fn with_filter(mut self, filter: Option<MetadataFilter>) -> Self {
        self.filter = filter;
        self
    }
}

/// One scored match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    /// Record id.
    pub id: String,

    /// Similarity score, higher is closer.
    pub score: f32,

    /// Stored values, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Embedding>,

    /// Stored metadata, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl QueryMatch {
    /// The chunk text stored in this match's metadata.
    pub fn text(&self) -> Option<&str> {
        self.metadata.as_ref()?.get("text")?.as_str()
    }
}

/// Matches in descending score order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub matches: Vec<QueryMatch>,
}

/// Storage for report vectors.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace `records` in `namespace`, returning how many were written.
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<usize>;

    /// Find the records in `namespace` closest to the request vector.
    async fn query(&self, namespace: &str, request: QueryRequest) -> Result<QueryResponse>;
}
