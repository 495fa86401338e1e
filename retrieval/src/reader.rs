//! Similarity search over stored reports, formatted for prompting.
//!
//! Two entry points share one pipeline: [`ReportRetriever::query`] for chat
//! and [`ReportRetriever::query_for_voice`] for spoken questions. The voice
//! path uses the voice embedding orchestrator, its own result cache and a
//! tighter result count.

use std::sync::Arc;

use tracing::{debug, error, warn};

use medrag_embeddings::{
    BoundedCache, CacheStats, Embedding, EmbeddingOrchestrator, VoiceEmbeddingOrchestrator,
    content_hash, fit_to_dimension, is_valid_vector,
};

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::index::{MetadataFilter, QueryMatch, QueryRequest, VectorIndex};

/// Returned when a query has no usable matches.
pub const NO_MATCHES: &str = "<nomatches>";

/// Default result count for voice queries.
pub const VOICE_DEFAULT_TOP_K: usize = 3;

/// Result ceiling for voice queries.
pub const VOICE_MAX_TOP_K: usize = 5;

/// Per-call query options; unset fields fall back to configured defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Restrict matches to one report.
    pub report_id: Option<String>,

    /// Requested number of results.
    pub top_k: Option<usize>,

    /// Minimum relevance score.
    pub min_score: Option<f32>,
}

impl QueryOptions {
    /// Restrict matches to `report_id`.
    pub fn for_report(report_id: impl Into<String>) -> Self {
        Self {
            report_id: Some(report_id.into()),
            ..Self::default()
        }
    }

    /// Request `top_k` results.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Require at least `min_score`.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    General,
    Voice,
}

/// Reads formatted findings back out of the vector index.
pub struct ReportRetriever {
    general: Arc<EmbeddingOrchestrator>,
    voice: Arc<VoiceEmbeddingOrchestrator>,
    index: Arc<dyn VectorIndex>,
    config: RetrievalConfig,
    model: String,
    query_cache: BoundedCache<String>,
    voice_query_cache: BoundedCache<String>,
}

impl ReportRetriever {
    /// Create a retriever over `index`.
    pub fn new(
        general: Arc<EmbeddingOrchestrator>,
        voice: Arc<VoiceEmbeddingOrchestrator>,
        index: Arc<dyn VectorIndex>,
        config: RetrievalConfig,
        model: impl Into<String>,
    ) -> Self {
        Self {
            query_cache: BoundedCache::new(config.query_cache_max_entries),
            voice_query_cache: BoundedCache::new(config.voice_query_cache_max_entries),
            general,
            voice,
            index,
            config,
            model: model.into(),
        }
    }

    /// Find report chunks relevant to `query_text`.
    ///
    /// Returns the formatted findings, or [`NO_MATCHES`] when nothing clears
    /// the score threshold or any step fails.
    pub async fn query(&self, query_text: &str, options: QueryOptions) -> String {
        self.run(Channel::General, query_text, options).await
    }

    /// Like [`Self::query`], tuned for voice: fewer results, voice caches.
    pub async fn query_for_voice(&self, query_text: &str, options: QueryOptions) -> String {
        self.run(Channel::Voice, query_text, options).await
    }

    /// Statistics for the general query-result cache.
    pub async fn query_cache_stats(&self) -> CacheStats {
        self.query_cache.stats().await
    }

    /// Statistics for the voice query-result cache.
    pub async fn voice_query_cache_stats(&self) -> CacheStats {
        self.voice_query_cache.stats().await
    }

    async fn run(&self, channel: Channel, query_text: &str, options: QueryOptions) -> String {
        let (default_top_k, max_top_k) = match channel {
            Channel::General => (self.config.default_top_k, self.config.max_top_k),
            Channel::Voice => (VOICE_DEFAULT_TOP_K, VOICE_MAX_TOP_K),
        };
        let top_k = clamp_top_k(options.top_k.unwrap_or(default_top_k), max_top_k);
        let min_score = options.min_score.unwrap_or(self.config.min_score);
        let report_id = options.report_id.as_deref();

        let cache = self.result_cache(channel);
        let key = self.cache_key(channel, query_text, top_k, min_score, report_id);
        if let Some(cached) = cache.get(&key).await {
            debug!("Query result served from cache");
            return cached;
        }

        match self
            .retrieve(channel, query_text, top_k, min_score, report_id)
            .await
        {
            Ok(formatted) => {
                cache.put(key, formatted.clone()).await;
                formatted
            }
            Err(err) => {
                error!("Vector query failed: {err}");
                NO_MATCHES.to_string()
            }
        }
    }

    async fn retrieve(
        &self,
        channel: Channel,
        query_text: &str,
        top_k: usize,
        min_score: f32,
        report_id: Option<&str>,
    ) -> Result<String> {
        let vector = self.query_vector(channel, query_text).await?;
        let request = QueryRequest::new(fit_to_dimension(vector, self.config.dimension), top_k)
            .with_filter(report_id.map(MetadataFilter::report));

        let response = self.index.query(&self.config.namespace, request).await?;
        let relevant: Vec<QueryMatch> = response
            .matches
            .into_iter()
            .filter(|m| m.score >= min_score)
            .take(top_k)
            .collect();

        debug!("{} matches at or above {min_score}", relevant.len());
        if relevant.is_empty() {
            return Ok(NO_MATCHES.to_string());
        }
        Ok(format_matches(&relevant))
    }

    async fn query_vector(&self, channel: Channel, query_text: &str) -> Result<Embedding> {
        let vector = match channel {
            Channel::General => self.general.embed_one(query_text, &self.model).await?,
            Channel::Voice => self.voice.embed_one(query_text, &self.model).await?,
        };
        if is_valid_vector(Some(vector.as_slice())) {
            return Ok(vector);
        }

        warn!("Query embedding is invalid, recomputing");
        Ok(self
            .general
            .recompute_authoritative(query_text, &self.model)
            .await?)
    }

    fn result_cache(&self, channel: Channel) -> &BoundedCache<String> {
        match channel {
            Channel::General => &self.query_cache,
            Channel::Voice => &self.voice_query_cache,
        }
    }

    fn cache_key(
        &self,
        channel: Channel,
        query_text: &str,
        top_k: usize,
        min_score: f32,
        report_id: Option<&str>,
    ) -> String {
        let key = format!(
            "{}|{}|{top_k}|{min_score}|{}",
            self.config.namespace,
            content_hash(query_text),
            report_id.unwrap_or("*")
        );
        match channel {
            Channel::General => key,
            Channel::Voice => format!("voice|{key}"),
        }
    }
}

fn clamp_top_k(requested: usize, ceiling: usize) -> usize {
    requested.clamp(1, ceiling.max(1))
}

/// Render matches as numbered findings separated by blank lines.
pub fn format_matches(matches: &[QueryMatch]) -> String {
    matches
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let n = i + 1;
            let score = m.score;
            let text = m.text().unwrap_or_default();
            format!("Clinical Finding {n} (relevance: {score:.3}):\n{text}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
