//! Configuration for the embedding providers and orchestrators.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::DEFAULT_MODEL;
use crate::error::{EmbeddingError, Result};

/// Default endpoint of the lightweight embedding server.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8765/embed";

/// Default hosted inference endpoint; the model id is appended as a path segment.
pub const DEFAULT_HOSTED_BASE_URL: &str =
    "https://api-inference.huggingface.co/pipeline/feature-extraction";

/// Configuration for the embedding cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Full URL of the lightweight embedding server.
    pub server_url: String,

    /// Credential for the hosted inference API.
    #[serde(skip_serializing)]
    pub hosted_api_key: Option<String>,

    /// Base URL of the hosted inference API.
    pub hosted_base_url: String,

    /// Model identifier passed to every provider.
    pub model: String,

    /// Whether the in-process model may run in this deployment.
    pub allow_local_model: bool,

    /// Capacity of the general embedding cache.
    pub cache_max_entries: usize,

    /// Capacity of the voice embedding cache.
    pub voice_cache_max_entries: usize,

    /// Upper bound on the voice path's wait for the embedding server.
    #[serde(with = "millis")]
    pub voice_server_timeout: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            hosted_api_key: None,
            hosted_base_url: DEFAULT_HOSTED_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            allow_local_model: true,
            cache_max_entries: 500,
            voice_cache_max_entries: 100,
            voice_server_timeout: Duration::from_secs(2),
        }
    }
}

impl EmbeddingConfig {
    /// Build a configuration from process environment variables.
    ///
    /// Unset variables keep their defaults. Fails with
    /// [`EmbeddingError::Config`] when a numeric value does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = env_var("EMBEDDING_SERVER_URL") {
            config.server_url = url;
        } else if env_var("EMBEDDING_SERVER_HOST").is_some()
            || env_var("EMBEDDING_SERVER_PORT").is_some()
        {
            let host = env_var("EMBEDDING_SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
            let port = env_var("EMBEDDING_SERVER_PORT").unwrap_or_else(|| "8765".to_string());
            config.server_url = format!("http://{host}:{port}/embed");
        }

        config.hosted_api_key = env_var("HF_API_KEY").or_else(|| env_var("HUGGINGFACE_API_KEY"));
        if let Some(url) = env_var("HF_INFERENCE_URL") {
            config.hosted_base_url = url;
        }
        if let Some(model) = env_var("EMBEDDING_MODEL") {
            config.model = model;
        }

        let constrained = env_var("EMBEDDING_CONSTRAINED_DEPLOYMENT").is_some_and(|v| is_truthy(&v))
            || env_var("VERCEL").is_some();
        config.allow_local_model = !constrained;

        if let Some(raw) = env_var("VOICE_EMBEDDING_TIMEOUT_MS") {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                EmbeddingError::Config(format!("VOICE_EMBEDDING_TIMEOUT_MS is not a number: {raw:?}"))
            })?;
            config.voice_server_timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }

    /// Set the embedding server URL.
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Set the hosted API credential.
    pub fn with_hosted_api_key(mut self, key: impl Into<String>) -> Self {
        self.hosted_api_key = Some(key.into());
        self
    }

    /// Set the hosted API base URL.
    pub fn with_hosted_base_url(mut self, url: impl Into<String>) -> Self {
        self.hosted_base_url = url.into();
        self
    }

    /// Set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Allow or forbid the in-process model.
    pub fn with_local_model(mut self, allowed: bool) -> Self {
        self.allow_local_model = allowed;
        self
    }

    /// Set the voice server timeout.
    pub fn with_voice_server_timeout(mut self, timeout: Duration) -> Self {
        self.voice_server_timeout = timeout;
        self
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
