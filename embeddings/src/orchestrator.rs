//! Cache-first embedding with a provider fallback cascade.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::Embedding;
use crate::cache::{CacheStats, EmbeddingCache};
use crate::config::EmbeddingConfig;
use crate::error::{EmbeddingError, Result};
use crate::hashing::cache_key;
use crate::provider::{
    EmbeddingProvider, EmbeddingServerProvider, HostedInferenceProvider, LocalModelProvider,
    PipelineLoader, ensure_count,
};
use crate::validate::is_valid_vector;

/// Tag for keys in the general embedding cache.
pub const GENERAL_CACHE_TAG: &str = "emb";

/// General-purpose embedding orchestrator.
///
/// Resolution order for uncached texts:
/// 1. embedding server
/// 2. in-process model (only when `allow_local_model` is set and a model is wired in)
/// 3. hosted inference API, whose error propagates to the caller
pub struct EmbeddingOrchestrator {
    cache: EmbeddingCache,
    server: Arc<dyn EmbeddingProvider>,
    local: Option<Arc<dyn EmbeddingProvider>>,
    hosted: Arc<dyn EmbeddingProvider>,
    allow_local_model: bool,
}

impl EmbeddingOrchestrator {
    /// Create an orchestrator with a server and a hosted provider and no
    /// in-process model.
    pub fn new(
        server: Arc<dyn EmbeddingProvider>,
        hosted: Arc<dyn EmbeddingProvider>,
        cache_max_entries: usize,
    ) -> Self {
        Self {
            cache: EmbeddingCache::new(cache_max_entries),
            server,
            local: None,
            hosted,
            allow_local_model: true,
        }
    }

    /// Build the standard provider set from `config`.
    ///
    /// Without a `loader` the in-process tier is absent and the cascade goes
    /// straight from the server to the hosted API.
    pub fn from_config(config: &EmbeddingConfig, loader: Option<Arc<dyn PipelineLoader>>) -> Self {
        let server: Arc<dyn EmbeddingProvider> =
            Arc::new(EmbeddingServerProvider::new(config.server_url.clone()));
        let hosted: Arc<dyn EmbeddingProvider> = Arc::new(
            HostedInferenceProvider::new()
                .with_api_key_opt(config.hosted_api_key.clone())
                .with_base_url(config.hosted_base_url.clone()),
        );

        let mut orchestrator = Self::new(server, hosted, config.cache_max_entries)
            .with_local_model_allowed(config.allow_local_model);
        if let Some(loader) = loader {
            orchestrator = orchestrator.with_local(Arc::new(LocalModelProvider::new(loader)));
        }
        orchestrator
    }

    /// Replace the embedding server provider.
    pub fn with_server(mut self, server: Arc<dyn EmbeddingProvider>) -> Self {
        self.server = server;
        self
    }

    /// Replace the hosted inference provider.
    pub fn with_hosted(mut self, hosted: Arc<dyn EmbeddingProvider>) -> Self {
        self.hosted = hosted;
        self
    }

    /// Wire in the in-process model provider.
    pub fn with_local(mut self, local: Arc<dyn EmbeddingProvider>) -> Self {
        self.local = Some(local);
        self
    }

    /// Allow or forbid the in-process model (constrained deployments forbid it).
    pub fn with_local_model_allowed(mut self, allowed: bool) -> Self {
        self.allow_local_model = allowed;
        self
    }

    /// Whether the in-process tier takes part in the cascade.
    pub fn allows_local_model(&self) -> bool {
        self.allow_local_model && self.local.is_some()
    }

    /// Shared handle to the embedding server provider.
    pub fn server(&self) -> Arc<dyn EmbeddingProvider> {
        Arc::clone(&self.server)
    }

    /// Shared handle to the hosted inference provider.
    pub fn hosted(&self) -> Arc<dyn EmbeddingProvider> {
        Arc::clone(&self.hosted)
    }

    /// The general embedding cache.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Statistics for the general embedding cache.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Embed `texts`, one vector per text in input order.
    ///
    /// Cached texts are served without provider calls; the rest go through
    /// the cascade in a single batch. Only vectors that pass
    /// [`is_valid_vector`] are written back to the cache.
    pub async fn embed_with_fallback(&self, texts: &[String], model: &str) -> Result<Vec<Embedding>> {
        let keys: Vec<String> = texts
            .iter()
            .map(|text| cache_key(GENERAL_CACHE_TAG, model, text))
            .collect();
        let mut resolved = self.cache.get_many(&keys).await;

        let missing: Vec<usize> = resolved
            .iter()
            .enumerate()
            .filter_map(|(i, hit)| hit.is_none().then_some(i))
            .collect();

        if missing.is_empty() {
            debug!("All {} embeddings served from cache", texts.len());
            return collect_resolved(resolved);
        }

        debug!(
            "{} of {} embeddings missing from cache",
            missing.len(),
            texts.len()
        );
        let pending: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
        let computed = self.compute(&pending, model).await?;

        cache_valid(&self.cache, &keys, &missing, &computed).await;
        for (i, vector) in missing.into_iter().zip(computed) {
            resolved[i] = Some(vector);
        }

        collect_resolved(resolved)
    }

    /// Embed a single text through the cache and cascade.
    pub async fn embed_one(&self, text: &str, model: &str) -> Result<Embedding> {
        let mut vectors = self.embed_with_fallback(&[text.to_string()], model).await?;
        vectors.pop().ok_or_else(|| {
            EmbeddingError::InvalidResponse("no embedding produced".to_string())
        })
    }

    /// Recompute `text` from the authoritative source, bypassing every cache.
    ///
    /// The in-process model is authoritative when it is wired in and allowed;
    /// otherwise the hosted API takes that role. The result must pass
    /// [`is_valid_vector`].
    pub async fn recompute_authoritative(&self, text: &str, model: &str) -> Result<Embedding> {
        let provider = match &self.local {
            Some(local) if self.allow_local_model => local,
            _ => &self.hosted,
        };

        debug!("Recomputing embedding with {}", provider.name());
        let mut vectors = attempt(provider.as_ref(), &[text.to_string()], model).await?;
        match vectors.pop() {
            Some(vector) if is_valid_vector(Some(vector.as_slice())) => Ok(vector),
            _ => Err(EmbeddingError::InvalidVector {
                provider: provider.name().to_string(),
            }),
        }
    }

    async fn compute(&self, texts: &[String], model: &str) -> Result<Vec<Embedding>> {
        match attempt(self.server.as_ref(), texts, model).await {
            Ok(vectors) => return Ok(vectors),
            Err(err) => warn!("{} failed, falling back: {err}", self.server.name()),
        }

        match &self.local {
            Some(local) if self.allow_local_model => {
                match attempt(local.as_ref(), texts, model).await {
                    Ok(vectors) => return Ok(vectors),
                    Err(err) => warn!(
                        "{} failed, falling back to {}: {err}",
                        local.name(),
                        self.hosted.name()
                    ),
                }
            }
            Some(_) => debug!("In-process model disabled for this deployment"),
            None => debug!("No in-process model configured"),
        }

        attempt(self.hosted.as_ref(), texts, model).await
    }
}

/// Call `provider` and check it produced one vector per text.
pub(crate) async fn attempt(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    model: &str,
) -> Result<Vec<Embedding>> {
    let vectors = provider.embed(texts, model).await?;
    ensure_count(provider.name(), texts.len(), vectors.len())?;
    Ok(vectors)
}

/// Write the computed vectors for `missing` back to `cache`, skipping any
/// that fail [`is_valid_vector`] so they are recomputed next time.
pub(crate) async fn cache_valid(
    cache: &EmbeddingCache,
    keys: &[String],
    missing: &[usize],
    computed: &[Embedding],
) {
    let mut rejected = 0;
    let entries: Vec<(String, Embedding)> = missing
        .iter()
        .zip(computed)
        .filter_map(|(&i, vector)| {
            if is_valid_vector(Some(vector.as_slice())) {
                Some((keys[i].clone(), vector.clone()))
            } else {
                rejected += 1;
                None
            }
        })
        .collect();
    if rejected > 0 {
        debug!("Not caching {rejected} invalid embeddings");
    }
    cache.put_many(entries).await;
}

pub(crate) fn collect_resolved(resolved: Vec<Option<Embedding>>) -> Result<Vec<Embedding>> {
    resolved
        .into_iter()
        .map(|vector| {
            vector.ok_or_else(|| {
                EmbeddingError::InvalidResponse("embedding missing after resolution".to_string())
            })
        })
        .collect()
}
