#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use medrag_embeddings::{
    Embedding, EmbeddingConfig, EmbeddingError, EmbeddingProvider, FeatureExtractionPipeline,
    PipelineLoader, PipelineOutput, PoolingOptions,
};
use medrag_retrieval::{EmbeddingService, InMemoryIndex, PipelineConfig, RetrievalConfig};

pub const DIMENSION: usize = 8;
pub const NAMESPACE: &str = "test-reports";

/// Unit vector along `axis`.
pub fn axis(axis: usize) -> Embedding {
    let mut vector = vec![0.0; DIMENSION];
    vector[axis] = 1.0;
    vector
}

/// Vector whose cosine similarity with `axis(0)` is exactly `cos`.
pub fn at_cosine(cos: f32) -> Embedding {
    let mut vector = vec![0.0; DIMENSION];
    vector[0] = cos;
    vector[1] = (1.0 - cos * cos).sqrt();
    vector
}

enum Behavior {
    Table {
        table: HashMap<String, Embedding>,
        default: Option<Embedding>,
    },
    Failing,
    Invalid,
}

/// Provider answering from a lookup table, with a call counter.
pub struct TableProvider {
    name: &'static str,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl TableProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            behavior: Behavior::Table {
                table: HashMap::new(),
                default: None,
            },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            behavior: Behavior::Failing,
            ..Self::new(name)
        }
    }

    pub fn invalid(name: &'static str) -> Self {
        Self {
            behavior: Behavior::Invalid,
            ..Self::new(name)
        }
    }

    pub fn with(mut self, text: &str, vector: Embedding) -> Self {
        if let Behavior::Table { table, .. } = &mut self.behavior {
            table.insert(text.to_string(), vector);
        }
        self
    }

    pub fn with_default(mut self, vector: Embedding) -> Self {
        if let Behavior::Table { default, .. } = &mut self.behavior {
            *default = Some(vector);
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for TableProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn embed(&self, texts: &[String], _model: &str) -> medrag_embeddings::Result<Vec<Embedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            Behavior::Failing => Err(EmbeddingError::ApiRequest(format!("{} is down", self.name))),
            Behavior::Invalid => Ok(texts.iter().map(|_| vec![f32::NAN; DIMENSION]).collect()),
            Behavior::Table { table, default } => texts
                .iter()
                .map(|text| {
                    table
                        .get(text)
                        .or(default.as_ref())
                        .cloned()
                        .ok_or_else(|| EmbeddingError::InvalidResponse(format!("no vector for {text:?}")))
                })
                .collect(),
        }
    }
}

/// Pipeline emitting two token vectors per text, `3 * axis(n)` and `axis(n)`,
/// so mean pooling plus normalization yields `axis(n)`.
pub struct TokenPipeline {
    axis: usize,
}

#[async_trait]
impl FeatureExtractionPipeline for TokenPipeline {
    async fn extract(
        &self,
        texts: &[String],
        _options: PoolingOptions,
    ) -> medrag_embeddings::Result<PipelineOutput> {
        let mut data = Vec::with_capacity(texts.len() * 2 * DIMENSION);
        for _ in texts {
            data.extend(axis(self.axis).iter().map(|value| value * 3.0));
            data.extend(axis(self.axis));
        }
        Ok(PipelineOutput::Tensor {
            data,
            dims: vec![texts.len(), 2, DIMENSION],
        })
    }
}

/// Loader handing out [`TokenPipeline`]s, counting loads.
pub struct TokenPipelineLoader {
    axis: usize,
    loads: AtomicUsize,
}

impl TokenPipelineLoader {
    pub fn new(axis: usize) -> Self {
        Self {
            axis,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PipelineLoader for TokenPipelineLoader {
    async fn load(&self, _model: &str) -> medrag_embeddings::Result<Arc<dyn FeatureExtractionPipeline>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(TokenPipeline { axis: self.axis }))
    }
}

pub struct Fixture {
    pub server: Arc<TableProvider>,
    pub local: Arc<TableProvider>,
    pub hosted: Arc<TableProvider>,
    pub index: Arc<InMemoryIndex>,
    pub service: EmbeddingService,
}

pub struct FixtureBuilder {
    server: TableProvider,
    local: TableProvider,
    hosted: TableProvider,
    embedding: EmbeddingConfig,
    retrieval: RetrievalConfig,
}

impl FixtureBuilder {
    pub fn new(server: TableProvider, local: TableProvider, hosted: TableProvider) -> Self {
        Self {
            server,
            local,
            hosted,
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default()
                .with_namespace(NAMESPACE)
                .with_dimension(DIMENSION),
        }
    }

    pub fn constrained(mut self) -> Self {
        self.embedding = self.embedding.with_local_model(false);
        self
    }

    pub fn retrieval(mut self, edit: impl FnOnce(RetrievalConfig) -> RetrievalConfig) -> Self {
        self.retrieval = edit(self.retrieval);
        self
    }

    pub fn build(self) -> Fixture {
        let server = Arc::new(self.server);
        let local = Arc::new(self.local);
        let hosted = Arc::new(self.hosted);
        let index = Arc::new(InMemoryIndex::new(self.retrieval.dimension));

        let service = EmbeddingService::builder(PipelineConfig::new(self.embedding, self.retrieval))
            .with_index(index.clone())
            .with_server_provider(server.clone())
            .with_local_provider(local.clone())
            .with_hosted_provider(hosted.clone())
            .build()
            .unwrap();

        Fixture {
            server,
            local,
            hosted,
            index,
            service,
        }
    }
}
