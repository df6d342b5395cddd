//! Remote embedding provider backed by the Gemini `batchEmbedContents` API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{EmbeddingMethod, EmbeddingProvider};
use crate::config::EmbeddingConfig;

/// Output width of text-embedding-004.
pub const GEMINI_EMBEDDING_DIM: usize = 768;

/// The API accepts at most 100 requests per batch call.
const BATCH_SIZE: usize = 100;

pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .gemini_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .context("the gemini embedding method requires GEMINI_API_KEY")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to create HTTP client")?;

        let model = match config.gemini_model.strip_prefix("models/") {
            Some(name) => name.to_string(),
            None => config.gemini_model.clone(),
        };

        Ok(Self {
            client,
            api_url: config.gemini_api_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    async fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/models/{}:batchEmbedContents", self.api_url, self.model);
        let model = format!("models/{}", self.model);

        let req = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: &model,
                    content: Content {
                        parts: [Part { text }],
                    },
                    task_type: "SEMANTIC_SIMILARITY",
                })
                .collect(),
        };

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&req)
            .send()
            .await
            .context("failed to call Gemini embedding API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Gemini embedding API returned {status}: {body}");
        }

        let body: BatchEmbedResponse = resp
            .json()
            .await
            .context("failed to parse Gemini embedding response")?;

        anyhow::ensure!(
            body.embeddings.len() == texts.len(),
            "Gemini returned {} embeddings for {} texts",
            body.embeddings.len(),
            texts.len()
        );

        Ok(body.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    fn method(&self) -> EmbeddingMethod {
        EmbeddingMethod::Gemini
    }

    fn dimensions(&self) -> usize {
        GEMINI_EMBEDDING_DIM
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        tracing::info!(count = texts.len(), model = %self.model, "embedding with Gemini API");

        let mut all = Vec::with_capacity(texts.len());
        for (i, chunk) in texts.chunks(BATCH_SIZE).enumerate() {
            let mut embeddings = self
                .embed_chunk(chunk)
                .await
                .with_context(|| format!("embedding batch {} failed", i + 1))?;
            all.append(&mut embeddings);
            tracing::debug!(done = all.len(), total = texts.len(), "Gemini progress");
        }
        Ok(all)
    }
}
