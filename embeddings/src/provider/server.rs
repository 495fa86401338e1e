//! Client for the lightweight embedding server.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmbeddingProvider, ensure_count, finite_embedding};
use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Provider backed by a local embedding server that accepts whole batches.
pub struct EmbeddingServerProvider {
    /// Full endpoint URL.
    url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Per-request timeout, if any.
    timeout: Option<Duration>,
}

impl EmbeddingServerProvider {
    /// Create a new server provider.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            timeout: None,
        }
    }

    /// Bound every request to `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Serialize)]
struct ServerRequest<'a> {
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ServerResponse {
    success: bool,
    #[serde(default)]
    embeddings: Vec<Vec<f64>>,
    error: Option<String>,
}

#[async_trait]
impl EmbeddingProvider for EmbeddingServerProvider {
    fn name(&self) -> &str {
        "embedding-server"
    }

    fn is_available(&self) -> bool {
        !self.url.is_empty()
    }

    async fn embed(&self, texts: &[String], _model: &str) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Requesting {} embeddings from {}", texts.len(), self.url);

        let mut request = self.client.post(&self.url).json(&ServerRequest { texts });
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "embedding server returned {status}: {error_text}"
            )));
        }

        let body: ServerResponse = response.json().await?;
        if !body.success {
            return Err(EmbeddingError::ApiRequest(format!(
                "embedding server reported failure: {}",
                body.error.unwrap_or_else(|| "unknown error".to_string())
            )));
        }

        ensure_count(self.name(), texts.len(), body.embeddings.len())?;
        body.embeddings
            .into_iter()
            .map(|values| finite_embedding(values, self.name()))
            .collect()
    }
}
