//! Composition root for the embedding and retrieval pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use medrag_embeddings::{
    CacheStats, EmbeddingOrchestrator, EmbeddingProvider, PipelineLoader, PrewarmReport,
    VoiceEmbeddingOrchestrator,
};

use crate::config::PipelineConfig;
use crate::error::{Result, RetrievalError};
use crate::index::{PineconeIndex, VectorIndex};
use crate::reader::{QueryOptions, ReportRetriever};
use crate::writer::ReportIndexer;

/// Stores medical reports and answers questions about them.
///
/// Owns both embedding orchestrators (and so both embedding caches), both
/// query-result caches, the writer and the reader. Build it once and share it
/// behind an [`Arc`].
pub struct EmbeddingService {
    /// Configuration.
    config: PipelineConfig,

    /// General-purpose embedding orchestrator.
    general: Arc<EmbeddingOrchestrator>,

    /// Voice embedding orchestrator.
    voice: Arc<VoiceEmbeddingOrchestrator>,

    /// Report writer.
    indexer: ReportIndexer,

    /// Report reader.
    retriever: ReportRetriever,
}

impl EmbeddingService {
    /// Create a new service builder.
    pub fn builder(config: PipelineConfig) -> EmbeddingServiceBuilder {
        EmbeddingServiceBuilder::new(config)
    }

    /// Assemble the service from already built orchestrators.
    pub fn from_parts(
        config: PipelineConfig,
        general: Arc<EmbeddingOrchestrator>,
        voice: Arc<VoiceEmbeddingOrchestrator>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        let model = config.embedding.model.clone();
        let retrieval = &config.retrieval;

        let indexer = ReportIndexer::new(
            Arc::clone(&general),
            Arc::clone(&index),
            retrieval.namespace.clone(),
            retrieval.dimension,
            retrieval.chunk_size,
            model.clone(),
        );
        let retriever = ReportRetriever::new(
            Arc::clone(&general),
            Arc::clone(&voice),
            index,
            retrieval.clone(),
            model,
        );

        info!(
            "Embedding service ready (namespace {}, dimension {}, local model {})",
            retrieval.namespace,
            retrieval.dimension,
            if general.allows_local_model() {
                "enabled"
            } else {
                "disabled"
            }
        );

        let hosted = general.hosted();
        if !hosted.is_available() {
            warn!("{} has no credential; the last fallback will fail", hosted.name());
        }

        Self {
            config,
            general,
            voice,
            indexer,
            retriever,
        }
    }

    /// The configuration this service was built with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Chunk, embed and store a report. See
    /// [`ReportIndexer::create_and_store_vector_embeddings`].
    pub async fn store_report(&self, report_data: &str, report_id: &str) -> bool {
        self.indexer
            .create_and_store_vector_embeddings(report_data, report_id)
            .await
    }

    /// Store a report, returning the cause on failure.
    pub async fn try_store_report(&self, report_data: &str, report_id: &str) -> Result<usize> {
        self.indexer.try_store(report_data, report_id).await
    }

    /// Answer a chat query. See [`ReportRetriever::query`].
    pub async fn query(&self, query_text: &str, options: QueryOptions) -> String {
        self.retriever.query(query_text, options).await
    }

    /// Answer a voice query. See [`ReportRetriever::query_for_voice`].
    pub async fn query_for_voice(&self, query_text: &str, options: QueryOptions) -> String {
        self.retriever.query_for_voice(query_text, options).await
    }

    /// Embed the common voice queries ahead of the first request.
    pub async fn prewarm_voice(&self) -> PrewarmReport {
        self.voice.prewarm(&self.config.embedding.model).await
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> ServiceStats {
        ServiceStats {
            embeddings: self.general.cache_stats().await,
            voice_embeddings: self.voice.cache_stats().await,
            query_results: self.retriever.query_cache_stats().await,
            voice_query_results: self.retriever.voice_query_cache_stats().await,
        }
    }
}

/// Builder for [`EmbeddingService`].
pub struct EmbeddingServiceBuilder {
    config: PipelineConfig,
    index: Option<Arc<dyn VectorIndex>>,
    loader: Option<Arc<dyn PipelineLoader>>,
    server: Option<Arc<dyn EmbeddingProvider>>,
    local: Option<Arc<dyn EmbeddingProvider>>,
    hosted: Option<Arc<dyn EmbeddingProvider>>,
}

impl EmbeddingServiceBuilder {
    /// Create a new builder.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            index: None,
            loader: None,
            server: None,
            local: None,
            hosted: None,
        }
    }

    /// Use `index` instead of the configured hosted index.
    pub fn with_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Load the in-process model through `loader`.
    pub fn with_pipeline_loader(mut self, loader: Arc<dyn PipelineLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Replace the embedding server provider.
    pub fn with_server_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.server = Some(provider);
        self
    }

    /// Replace the in-process provider.
    pub fn with_local_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.local = Some(provider);
        self
    }

    /// Replace the hosted inference provider.
    pub fn with_hosted_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.hosted = Some(provider);
        self
    }

    /// Build the service.
    ///
    /// Fails when no index was supplied and the configuration names no
    /// hosted index.
    pub fn build(self) -> Result<EmbeddingService> {
        let embedding = &self.config.embedding;

        let index = match self.index {
            Some(index) => index,
            None => hosted_index(&self.config)?,
        };

        let mut general = EmbeddingOrchestrator::from_config(embedding, self.loader);
        if let Some(server) = self.server {
            general = general.with_server(server);
        }
        if let Some(hosted) = self.hosted {
            general = general.with_hosted(hosted);
        }
        if let Some(local) = self.local {
            general = general.with_local(local);
        }

        // One server and one hosted client serve both orchestrators.
        let voice = VoiceEmbeddingOrchestrator::new(
            general.server(),
            general.hosted(),
            embedding.voice_cache_max_entries,
            embedding.voice_server_timeout,
        );

        Ok(EmbeddingService::from_parts(
            self.config,
            Arc::new(general),
            Arc::new(voice),
            index,
        ))
    }
}

fn hosted_index(config: &PipelineConfig) -> Result<Arc<dyn VectorIndex>> {
    match (&config.retrieval.index_host, &config.retrieval.index_api_key) {
        (Some(host), Some(api_key)) => Ok(Arc::new(PineconeIndex::new(host, api_key))),
        _ => Err(RetrievalError::Config(
            "no vector index supplied and PINECONE_INDEX_HOST/PINECONE_API_KEY are not set"
                .to_string(),
        )),
    }
}

/// Cache statistics for every cache the service owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    /// General embedding cache.
    pub embeddings: CacheStats,

    /// Voice embedding cache.
    pub voice_embeddings: CacheStats,

    /// General query-result cache.
    pub query_results: CacheStats,

    /// Voice query-result cache.
    pub voice_query_results: CacheStats,
}
