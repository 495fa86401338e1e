//! HTTP client for a Pinecone-compatible hosted vector index.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{QueryRequest, QueryResponse, VectorIndex, VectorRecord};
use crate::error::{Result, RetrievalError};

/// Largest batch sent in one upsert request.
pub const UPSERT_BATCH_SIZE: usize = 100;

/// Hosted vector index reached over HTTP.
pub struct PineconeIndex {
    /// Index host, e.g. `https://reports-abc123.svc.pinecone.io`.
    host: String,

    /// API key.
    api_key: String,

    /// Records per upsert request.
    batch_size: usize,

    /// HTTP client.
    client: reqwest::Client,
}

#[derive(Serialize)]
struct UpsertBody<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertReply {
    #[serde(default)]
    upserted_count: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody<'a> {
    namespace: &'a str,
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

impl PineconeIndex {
    /// Create a client for the index at `host`.
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Self {
        let host: String = host.into();
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{host}")
        };

        Self {
            host: host.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            batch_size: UPSERT_BATCH_SIZE,
            client: reqwest::Client::new(),
        }
    }

    /// Set the number of records per upsert request.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Index host URL.
    pub fn host(&self) -> &str {
        &self.host
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let url = format!("{}{path}", self.host);
        debug!("POST {url}");

        let response = self
            .client
            .post(&url)
            .header("Api-Key", self.api_key.as_str())
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Index(format!(
                "{path} returned {status}: {error_text}"
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<usize> {
        let mut written = 0;
        for batch in records.chunks(self.batch_size) {
            let reply: UpsertReply = self
                .post("/vectors/upsert", &UpsertBody {
                    vectors: batch,
                    namespace,
                })
                .await?
                .json()
                .await?;
            written += reply.upserted_count.unwrap_or(batch.len());
        }

        info!("Upserted {written} records into {namespace}");
        Ok(written)
    }

    async fn query(&self, namespace: &str, request: QueryRequest) -> Result<QueryResponse> {
        let body = QueryBody {
            namespace,
            vector: &request.vector,
            top_k: request.top_k,
            include_metadata: request.include_metadata,
            include_values: request.include_values,
            filter: request.filter.as_ref().map(|filter| filter.to_query_json()),
        };

        let response: QueryResponse = self.post("/query", &body).await?.json().await?;
        debug!(
            "Query in {namespace} returned {} matches",
            response.matches.len()
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{MetadataFilter, RecordMetadata};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(i: usize) -> VectorRecord {
        VectorRecord {
            id: format!("r1_chunk_{i}"),
            values: vec![0.1; 4],
            metadata: RecordMetadata {
                text: format!("chunk {i}"),
                report_id: "r1".to_string(),
                chunk_index: i,
                total_chunks: 3,
                timestamp: "2024-01-01T00:00:00+00:00".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_upsert_batches_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .and(header("Api-Key", "secret"))
            .and(body_partial_json(json!({"namespace": "medical-reports"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": 2})))
            .expect(2)
            .mount(&server)
            .await;

        let index = PineconeIndex::new(server.uri(), "secret").with_batch_size(2);
        let written = index
            .upsert("medical-reports", (0..3).map(record).collect())
            .await
            .unwrap();

        // The mock reports 2 for each of the two batches.
        assert_eq!(written, 4);
    }

    #[tokio::test]
    async fn test_upsert_sends_camel_case_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .and(body_partial_json(json!({
                "vectors": [{"id": "r1_chunk_0", "metadata": {"reportId": "r1", "chunkIndex": 0, "totalChunks": 3}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let index = PineconeIndex::new(server.uri(), "secret");
        let written = index.upsert("ns", vec![record(0)]).await.unwrap();

        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn test_query_sends_filter_and_parses_matches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_partial_json(json!({
                "namespace": "ns",
                "topK": 3,
                "includeMetadata": true,
                "includeValues": false,
                "filter": {"reportId": {"$eq": "r1"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "matches": [
                    {"id": "r1_chunk_0", "score": 0.91, "values": [], "metadata": {"text": "LDL high"}},
                    {"id": "r1_chunk_2", "score": 0.55}
                ],
                "namespace": "ns"
            })))
            .mount(&server)
            .await;

        let index = PineconeIndex::new(server.uri(), "secret");
        let request = QueryRequest::new(vec![0.1; 4], 3)
            .with_filter(Some(MetadataFilter::report("r1")));
        let response = index.query("ns", request).await.unwrap();

        assert_eq!(response.matches.len(), 2);
        assert_eq!(response.matches[0].text(), Some("LDL high"));
        assert_eq!(response.matches[1].metadata, None);
    }

    #[tokio::test]
    async fn test_error_status_is_index_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let index = PineconeIndex::new(server.uri(), "wrong");
        let err = index
            .query("ns", QueryRequest::new(vec![0.1; 4], 1))
            .await
            .unwrap_err();

        assert!(matches!(err, RetrievalError::Index(message) if message.contains("401")));
    }

    #[test]
    fn test_host_gets_scheme() {
        let index = PineconeIndex::new("reports.svc.example.io/", "k");
        assert_eq!(index.host(), "https://reports.svc.example.io");
    }
}
