//! Hosted inference API provider (Hugging Face feature-extraction compatible).

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::{EmbeddingProvider, finite_embedding};
use crate::Embedding;
use crate::config::DEFAULT_HOSTED_BASE_URL;
use crate::error::{EmbeddingError, Result};
use crate::similarity::{mean_pool, normalize};

/// Hosted feature-extraction provider.
///
/// The API has no batching, so every text costs one request.
pub struct HostedInferenceProvider {
    /// API key.
    api_key: Option<String>,

    /// API base URL; the model id is appended as a path segment.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,
}

impl HostedInferenceProvider {
    /// Create a new hosted provider, reading the key from `HF_API_KEY`.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("HF_API_KEY").ok(),
            base_url: DEFAULT_HOSTED_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Replace (or clear) the API key.
    pub fn with_api_key_opt(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str, model: &str) -> Result<Embedding> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            EmbeddingError::ProviderNotConfigured("hosted inference API key is not set".to_string())
        })?;

        let url = format!("{}/{model}", self.base_url.trim_end_matches('/'));
        debug!("Requesting hosted embedding from {url}");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&serde_json::json!({ "inputs": text }))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "hosted inference returned {status}: {error_text}"
            )));
        }

        let body: Value = response.json().await?;
        coerce_feature_output(body, self.name())
    }
}

impl Default for HostedInferenceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for HostedInferenceProvider {
    fn name(&self) -> &str {
        "hosted-inference"
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Embedding>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed_one(text, model).await?);
        }
        if !results.is_empty() {
            info!("Generated {} hosted embeddings", results.len());
        }
        Ok(results)
    }
}

/// Reduce a feature-extraction payload to one sentence embedding.
///
/// Accepts a flat vector, a token matrix (mean-pooled, then normalized) or a
/// batch wrapper around either.
fn coerce_feature_output(body: Value, provider: &str) -> Result<Embedding> {
    let Value::Array(items) = body else {
        return Err(EmbeddingError::InvalidResponse(format!(
            "{provider} returned a non-array payload"
        )));
    };

    enum Shape {
        Flat,
        Matrix,
        Batch,
    }

    let shape = match items.first() {
        None => {
            return Err(EmbeddingError::InvalidResponse(format!(
                "{provider} returned an empty payload"
            )));
        }
        Some(Value::Number(_)) => Shape::Flat,
        Some(Value::Array(inner)) if matches!(inner.first(), Some(Value::Array(_))) => Shape::Batch,
        Some(Value::Array(_)) => Shape::Matrix,
        Some(other) => {
            return Err(EmbeddingError::InvalidResponse(format!(
                "{provider} returned unexpected element {other}"
            )));
        }
    };

    match shape {
        Shape::Flat => finite_embedding(numbers(items, provider)?, provider),
        Shape::Batch => match items.into_iter().next() {
            Some(first) => coerce_feature_output(first, provider),
            None => Err(EmbeddingError::InvalidResponse(format!(
                "{provider} returned an empty batch"
            ))),
        },
        Shape::Matrix => {
            let rows = items
                .into_iter()
                .map(|row| match row {
                    Value::Array(values) => finite_embedding(numbers(values, provider)?, provider),
                    _ => Err(EmbeddingError::InvalidResponse(format!(
                        "{provider} returned a ragged token matrix"
                    ))),
                })
                .collect::<Result<Vec<_>>>()?;
            if rows.len() == 1 {
                return Ok(rows.into_iter().flatten().collect());
            }
            let mut pooled = mean_pool(&rows)?;
            normalize(&mut pooled);
            Ok(pooled)
        }
    }
}

fn numbers(values: Vec<Value>, provider: &str) -> Result<Vec<f64>> {
    values
        .into_iter()
        .map(|v| {
            v.as_f64().ok_or_else(|| {
                EmbeddingError::InvalidResponse(format!("{provider} returned non-numeric value {v}"))
            })
        })
        .collect()
}
