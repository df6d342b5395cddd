//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait with two implementations: a local
//! all-MiniLM-L6-v2 model run through ONNX Runtime, and the Gemini embedding
//! API. Providers are created via [`create_provider`] and memoised per method
//! by [`ProviderCache`].

pub mod gemini;
pub mod local;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::EmbeddingConfig;

/// Which vectorizer turns descriptions into vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMethod {
    /// all-MiniLM-L6-v2 via ONNX Runtime, offline.
    #[default]
    Local,
    /// Google Generative Language embedding API.
    Gemini,
}

impl EmbeddingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Gemini => "gemini",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Local => "Local model (all-MiniLM-L6-v2)",
            Self::Gemini => "Gemini API (text-embedding-004)",
        }
    }
}

impl std::fmt::Display for EmbeddingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmbeddingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "gemini" => Ok(Self::Gemini),
            other => Err(format!(
                "unsupported embedding method: {other}. Supported: local, gemini"
            )),
        }
    }
}

/// Trait for embedding text into vectors.
///
/// `embed_batch` returns exactly one vector per input text, each of
/// [`EmbeddingProvider::dimensions`] length, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn method(&self) -> EmbeddingMethod;

    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Create an embedding provider for `method`.
///
/// The local provider fails if model files are missing; run
/// `galaxy model download` first. The Gemini provider needs an API key.
pub fn create_provider(
    method: EmbeddingMethod,
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>> {
    match method {
        EmbeddingMethod::Local => {
            let provider = local::LocalEmbeddingProvider::new(config)?;
            Ok(Arc::new(provider))
        }
        EmbeddingMethod::Gemini => {
            let provider = gemini::GeminiEmbeddingProvider::new(config)?;
            Ok(Arc::new(provider))
        }
    }
}

/// Keeps one provider per method alive for the whole process so the local
/// model is loaded at most once.
pub struct ProviderCache {
    config: EmbeddingConfig,
    providers: Mutex<HashMap<EmbeddingMethod, Arc<dyn EmbeddingProvider>>>,
}

impl ProviderCache {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            config,
            providers: Mutex::new(HashMap::new()),
        }
    }

    /// Seed the cache with an existing provider (used to inject test doubles).
    pub async fn insert(&self, provider: Arc<dyn EmbeddingProvider>) {
        self.providers
            .lock()
            .await
            .insert(provider.method(), provider);
    }

    pub async fn get(&self, method: EmbeddingMethod) -> Result<Arc<dyn EmbeddingProvider>> {
        let mut providers = self.providers.lock().await;
        if let Some(provider) = providers.get(&method) {
            return Ok(Arc::clone(provider));
        }

        let config = self.config.clone();
        let provider =
            tokio::task::spawn_blocking(move || create_provider(method, &config)).await??;
        tracing::info!(method = %method, dims = provider.dimensions(), "embedding provider ready");
        providers.insert(method, Arc::clone(&provider));
        Ok(provider)
    }
}
