//! Query → fetch → vectorize → reduce, in that order and nothing else.
//!
//! [`explore`] is the single entry point shared by the web UI and the CLI.
//! Rendering is left to the caller so both surfaces can choose their own
//! chart options.

use std::collections::HashMap;

use serde::Serialize;

use crate::embedding::{EmbeddingMethod, EmbeddingProvider};
use crate::github::{GitHubClient, GitHubError, Repository, SearchQuery, SortBy};
use crate::reduce::{self, ReduceError, ReductionParams};

/// Errors surfaced to the user as-is.
#[derive(Debug, thiserror::Error)]
pub enum ExploreError {
    #[error("please enter a keyword")]
    EmptyKeyword,

    #[error(transparent)]
    Search(#[from] GitHubError),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("cannot build a map: {0}")]
    Reduce(#[from] ReduceError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct ExploreRequest {
    pub keyword: String,
    pub max_results: usize,
    pub language: Option<String>,
    pub sort: SortBy,
}

impl ExploreRequest {
    pub fn new(keyword: impl Into<String>, max_results: usize) -> Self {
        Self {
            keyword: keyword.into(),
            max_results,
            language: None,
            sort: SortBy::default(),
        }
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }
}

/// A repository placed on the map.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GalaxyPoint {
    #[serde(flatten)]
    pub repo: Repository,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Summary {
    pub total_repos: usize,
    pub total_stars: u64,
    pub top_language: String,
    pub avg_stars: u64,
}

impl Summary {
    /// Most common language breaks ties by first appearance in result order.
    pub fn from_repos<'a>(repos: impl IntoIterator<Item = &'a Repository>) -> Self {
        let mut total_repos = 0usize;
        let mut total_stars = 0u64;
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();

        for (i, repo) in repos.into_iter().enumerate() {
            total_repos += 1;
            total_stars += repo.stars;
            counts.entry(repo.language.as_str()).or_insert((0, i)).0 += 1;
        }

        let top_language = counts
            .into_iter()
            .max_by(|(_, (ca, fa)), (_, (cb, fb))| ca.cmp(cb).then(fb.cmp(fa)))
            .map(|(lang, _)| lang.to_string())
            .unwrap_or_else(|| crate::github::UNKNOWN_LANGUAGE.to_string());

        let avg_stars = if total_repos == 0 {
            0
        } else {
            total_stars / total_repos as u64
        };

        Self {
            total_repos,
            total_stars,
            top_language,
            avg_stars,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Galaxy {
    pub keyword: String,
    pub method: EmbeddingMethod,
    pub dimensions: usize,
    pub points: Vec<GalaxyPoint>,
    pub summary: Summary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Exploration {
    /// The search matched nothing; nothing was embedded or reduced.
    Empty { keyword: String },
    Galaxy(Galaxy),
}

/// Run one exploration end to end.
pub async fn explore(
    github: &GitHubClient,
    provider: &dyn EmbeddingProvider,
    params: &ReductionParams,
    request: &ExploreRequest,
) -> Result<Exploration, ExploreError> {
    let keyword = request.keyword.trim();
    if keyword.is_empty() {
        return Err(ExploreError::EmptyKeyword);
    }

    let query = SearchQuery {
        sort: request.sort,
        ..SearchQuery::new(keyword, request.max_results).with_language(request.language.clone())
    };
    let repos = github.search_repositories(&query).await?;

    if repos.is_empty() {
        return Ok(Exploration::Empty {
            keyword: keyword.to_string(),
        });
    }

    let texts: Vec<String> = repos.iter().map(|r| r.description.clone()).collect();
    let vectors = provider
        .embed_batch(&texts)
        .await
        .map_err(|e| ExploreError::Embedding(format!("{e:#}")))?;

    if vectors.len() != repos.len() {
        return Err(ExploreError::Embedding(format!(
            "{} provider returned {} vectors for {} descriptions",
            provider.method(),
            vectors.len(),
            repos.len()
        )));
    }
    let dimensions = vectors.first().map_or(0, Vec::len);
    tracing::info!(count = vectors.len(), dimensions, method = %provider.method(), "vectorized");

    let params = params.clone();
    let coords = tokio::task::spawn_blocking(move || reduce::reduce(&vectors, &params)).await??;

    let summary = Summary::from_repos(&repos);
    let points = repos
        .into_iter()
        .zip(coords)
        .map(|(repo, p)| GalaxyPoint { repo, x: p.x, y: p.y })
        .collect();

    Ok(Exploration::Galaxy(Galaxy {
        keyword: keyword.to_string(),
        method: provider.method(),
        dimensions,
        points,
        summary,
    }))
}
