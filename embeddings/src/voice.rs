//! Latency-bounded embedding for voice interactions.
//!
//! Differs from [`crate::EmbeddingOrchestrator`] in three ways: it has its own
//! smaller cache, the embedding server gets a short deadline, and the
//! fallback fans out one hosted request per text concurrently. The in-process
//! model is never used here.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::cache::{CacheStats, EmbeddingCache};
use crate::error::{EmbeddingError, Result};
use crate::hashing::cache_key;
use crate::orchestrator::{attempt, cache_valid, collect_resolved};
use crate::provider::EmbeddingProvider;

/// Tag for keys in the voice embedding cache.
pub const VOICE_CACHE_TAG: &str = "voice";

/// Queries embedded ahead of time so the first spoken question is fast.
pub const COMMON_VOICE_QUERIES: &[&str] = &[
    "What are my latest test results?",
    "Summarize my most recent report",
    "Are any of my values abnormal?",
    "What is my blood sugar level?",
    "What is my cholesterol level?",
    "What is my blood pressure?",
    "How is my kidney function?",
    "How is my liver function?",
    "What medications should I take?",
    "What should I discuss with my doctor?",
];

/// Outcome of [`VoiceEmbeddingOrchestrator::prewarm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrewarmReport {
    /// Queries now present in the voice cache.
    pub warmed: usize,

    /// Queries that could not be embedded.
    pub failed: usize,
}

/// Voice-path embedding orchestrator.
pub struct VoiceEmbeddingOrchestrator {
    cache: EmbeddingCache,
    server: Arc<dyn EmbeddingProvider>,
    hosted: Arc<dyn EmbeddingProvider>,
    server_timeout: Duration,
}

impl VoiceEmbeddingOrchestrator {
    /// Create a voice orchestrator.
    pub fn new(
        server: Arc<dyn EmbeddingProvider>,
        hosted: Arc<dyn EmbeddingProvider>,
        cache_max_entries: usize,
        server_timeout: Duration,
    ) -> Self {
        Self {
            cache: EmbeddingCache::new(cache_max_entries),
            server,
            hosted,
            server_timeout,
        }
    }

    /// The voice embedding cache.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Statistics for the voice embedding cache.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Embed `texts` for a voice request, one vector per text in input order.
    pub async fn embed_for_voice(&self, texts: &[String], model: &str) -> Result<Vec<Embedding>> {
        let keys: Vec<String> = texts
            .iter()
            .map(|text| cache_key(VOICE_CACHE_TAG, model, text))
            .collect();
        let mut resolved = self.cache.get_many(&keys).await;

        let missing: Vec<usize> = resolved
            .iter()
            .enumerate()
            .filter_map(|(i, hit)| hit.is_none().then_some(i))
            .collect();
        if missing.is_empty() {
            debug!("Voice embeddings served from cache");
            return collect_resolved(resolved);
        }

        let pending: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
        let computed = self.compute(&pending, model).await?;

        cache_valid(&self.cache, &keys, &missing, &computed).await;
        for (i, vector) in missing.into_iter().zip(computed) {
            resolved[i] = Some(vector);
        }

        collect_resolved(resolved)
    }

    /// Embed a single voice query.
    pub async fn embed_one(&self, text: &str, model: &str) -> Result<Embedding> {
        let mut vectors = self.embed_for_voice(&[text.to_string()], model).await?;
        vectors.pop().ok_or_else(|| {
            EmbeddingError::InvalidResponse("no embedding produced".to_string())
        })
    }

    /// Embed every entry of [`COMMON_VOICE_QUERIES`] into the voice cache.
    ///
    /// Each query is embedded on its own; a failure is logged and counted but
    /// does not stop the others.
    pub async fn prewarm(&self, model: &str) -> PrewarmReport {
        let outcomes = join_all(
            COMMON_VOICE_QUERIES
                .iter()
                .map(|query| async move { (*query, self.embed_one(query, model).await) }),
        )
        .await;

        let mut report = PrewarmReport {
            warmed: 0,
            failed: 0,
        };
        for (query, outcome) in outcomes {
            match outcome {
                Ok(_) => report.warmed += 1,
                Err(err) => {
                    warn!("Failed to pre-warm voice query {query:?}: {err}");
                    report.failed += 1;
                }
            }
        }

        info!(
            "Pre-warmed {} voice queries ({} failed)",
            report.warmed, report.failed
        );
        report
    }

    async fn compute(&self, texts: &[String], model: &str) -> Result<Vec<Embedding>> {
        let server_call = attempt(self.server.as_ref(), texts, model);
        let failure = match tokio::time::timeout(self.server_timeout, server_call).await {
            Ok(Ok(vectors)) => return Ok(vectors),
            Ok(Err(err)) => err,
            Err(_) => EmbeddingError::Timeout {
                provider: self.server.name().to_string(),
                millis: self.server_timeout.as_millis() as u64,
            },
        };
        warn!(
            "Voice embedding via {} failed, fanning out to {}: {failure}",
            self.server.name(),
            self.hosted.name()
        );

        try_join_all(texts.iter().map(|text| self.hosted_single(text, model))).await
    }

    async fn hosted_single(&self, text: &str, model: &str) -> Result<Embedding> {
        let mut vectors = attempt(self.hosted.as_ref(), &[text.to_string()], model).await?;
        vectors.pop().ok_or_else(|| {
            EmbeddingError::InvalidResponse(format!("{} returned no embedding", self.hosted.name()))
        })
    }
}
