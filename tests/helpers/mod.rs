#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use galaxy::config::{GalaxyConfig, GitHubConfig};
use galaxy::embedding::{EmbeddingMethod, EmbeddingProvider};
use galaxy::github::GitHubClient;
use mockito::{Matcher, Mock, ServerGuard};

pub const TOKEN: &str = "test-token";

/// GitHub settings pointing at a mock server.
pub fn github_config(url: &str) -> GitHubConfig {
    GitHubConfig {
        api_url: url.to_string(),
        token: Some(TOKEN.to_string()),
        ..GitHubConfig::default()
    }
}

pub fn github_client(server: &ServerGuard) -> GitHubClient {
    GitHubClient::new(&github_config(&server.url())).unwrap()
}

/// Full config for the web UI: mock GitHub, fast t-SNE.
pub fn app_config(url: &str) -> GalaxyConfig {
    let mut config = GalaxyConfig::default();
    config.github = github_config(url);
    config.reduction.max_iter = 250;
    config
}

/// One search item as the API returns it. Every third repo lacks a description.
pub fn search_item(i: usize) -> serde_json::Value {
    let languages = ["Python", "Rust", "Go"];
    serde_json::json!({
        "id": i,
        "full_name": format!("owner{i}/repo{i}"),
        "description": if i % 3 == 2 { None } else { Some(format!("Project number {i} for testing")) },
        "stargazers_count": 1000 - i,
        "html_url": format!("https://github.com/owner{i}/repo{i}"),
        "topics": ["demo"],
        "language": languages[i % 3],
    })
}

/// Search response body with items `start..start + count`.
pub fn search_body(start: usize, count: usize) -> String {
    let items: Vec<_> = (start..start + count).map(search_item).collect();
    serde_json::json!({
        "total_count": 5000,
        "incomplete_results": false,
        "items": items,
    })
    .to_string()
}

/// Mock one search page. `q` is the decoded `q` parameter.
pub async fn mock_search_page(
    server: &mut ServerGuard,
    q: &str,
    per_page: usize,
    page: usize,
    items: usize,
) -> Mock {
    server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), q.into()),
            Matcher::UrlEncoded("sort".into(), "stars".into()),
            Matcher::UrlEncoded("order".into(), "desc".into()),
            Matcher::UrlEncoded("per_page".into(), per_page.to_string()),
            Matcher::UrlEncoded("page".into(), page.to_string()),
        ]))
        .match_header("authorization", format!("Bearer {TOKEN}").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("x-ratelimit-remaining", "29")
        .with_body(search_body((page - 1) * per_page, items))
        .create_async()
        .await
}

/// Deterministic embedding provider that records how often it is called.
///
/// Vectors are one-hot-ish on a hash of the text so equal descriptions
/// land on equal vectors.
pub struct FakeProvider {
    method: EmbeddingMethod,
    dims: usize,
    pub calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new(method: EmbeddingMethod, dims: usize) -> Arc<Self> {
        Arc::new(Self {
            method,
            dims,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FakeProvider {
    fn method(&self) -> EmbeddingMethod {
        self.method
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; self.dims];
                let h = t.bytes().fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
                v[h % self.dims] = 1.0;
                v[t.len() % self.dims] += 0.5;
                v
            })
            .collect())
    }
}

/// Provider that always fails, for error propagation tests.
pub struct FailingProvider;

#[async_trait]
impl EmbeddingProvider for FailingProvider {
    fn method(&self) -> EmbeddingMethod {
        EmbeddingMethod::Gemini
    }

    fn dimensions(&self) -> usize {
        768
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        anyhow::bail!("quota exceeded")
    }
}
