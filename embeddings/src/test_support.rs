//! Scriptable providers for unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::EmbeddingProvider;

#[derive(Clone, Copy)]
enum Behavior {
    Working(f32),
    Failing,
    ShortBatch,
    Invalid,
    Slow(Duration, f32),
}

pub(crate) struct MockProvider {
    name: &'static str,
    behavior: Behavior,
    calls: AtomicUsize,
    batches: Mutex<Vec<usize>>,
}

impl MockProvider {
    fn with(name: &'static str, behavior: Behavior) -> Self {
        Self {
            name,
            behavior,
            calls: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn working(name: &'static str, seed: f32) -> Self {
        Self::with(name, Behavior::Working(seed))
    }

    pub(crate) fn failing(name: &'static str) -> Self {
        Self::with(name, Behavior::Failing)
    }

    pub(crate) fn short_batch(name: &'static str) -> Self {
        Self::with(name, Behavior::ShortBatch)
    }

    pub(crate) fn invalid(name: &'static str) -> Self {
        Self::with(name, Behavior::Invalid)
    }

    pub(crate) fn slow(name: &'static str, delay: Duration, seed: f32) -> Self {
        Self::with(name, Behavior::Slow(delay, seed))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn batches(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    /// Deterministic 8-dimensional vector for `text`.
    pub(crate) fn expected_vector(seed: f32, text: &str) -> Embedding {
        let sum: u32 = text.bytes().map(u32::from).sum();
        (0..8)
            .map(|i| seed + (sum % 97) as f32 / 100.0 + i as f32 * 0.001)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn embed(&self, texts: &[String], _model: &str) -> Result<Vec<Embedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(texts.len());

        match self.behavior {
            Behavior::Working(seed) => Ok(texts
                .iter()
                .map(|text| Self::expected_vector(seed, text))
                .collect()),
            Behavior::Failing => Err(EmbeddingError::ApiRequest(format!("{} is down", self.name))),
            Behavior::ShortBatch => Ok(Vec::new()),
            Behavior::Invalid => Ok(texts.iter().map(|_| vec![f32::NAN; 8]).collect()),
            Behavior::Slow(delay, seed) => {
                tokio::time::sleep(delay).await;
                Ok(texts
                    .iter()
                    .map(|text| Self::expected_vector(seed, text))
                    .collect())
            }
        }
    }
}
