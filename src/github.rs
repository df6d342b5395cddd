//! GitHub repository search client.
//!
//! Wraps `GET /search/repositories`, paginating until the requested result cap
//! is reached. Records are normalised into [`Repository`] values so that the
//! rest of the pipeline never sees missing descriptions or languages.

use std::time::Duration;

use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::GitHubConfig;

/// GitHub returns at most 100 items per search page.
pub const MAX_PER_PAGE: usize = 100;

/// The search API never serves results beyond the first 1000 matches.
pub const SEARCH_WINDOW: usize = 1000;

/// Warn when fewer requests than this remain in the current window.
const LOW_RATE_LIMIT: u64 = 10;

pub const NO_DESCRIPTION: &str = "No description available";
pub const UNKNOWN_LANGUAGE: &str = "Unknown";

#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("GitHub token is missing. Set GITHUB_TOKEN in .env or the environment.")]
    MissingToken,

    #[error("GitHub API rate limit reached. Try again in {wait_minutes} minute(s).")]
    RateLimited { wait_minutes: u64 },

    #[error("GitHub API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("GitHub API request timed out. Check your network connection.")]
    Timeout,

    #[error("GitHub API request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("failed to decode GitHub API response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl From<reqwest::Error> for GitHubError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err)
        } else {
            Self::Request(err)
        }
    }
}

/// A repository returned by the search API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    /// Full `owner/name`.
    pub name: String,
    pub description: String,
    pub language: String,
    pub stars: u64,
    pub url: String,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl Repository {
    /// Repository name without the owner prefix.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// Sort key for search results; order is always descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Stars,
    Forks,
    Updated,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stars => "stars",
            Self::Forks => "forks",
            Self::Updated => "updated",
        }
    }
}

impl std::fmt::Display for SortBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stars" => Ok(Self::Stars),
            "forks" => Ok(Self::Forks),
            "updated" => Ok(Self::Updated),
            _ => Err(format!("unknown sort key: {s}. Supported: stars, forks, updated")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub keyword: String,
    pub max_results: usize,
    pub language: Option<String>,
    pub sort: SortBy,
}

impl SearchQuery {
    pub fn new(keyword: impl Into<String>, max_results: usize) -> Self {
        Self {
            keyword: keyword.into(),
            max_results,
            language: None,
            sort: SortBy::default(),
        }
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language.filter(|l| !l.trim().is_empty());
        self
    }

    /// The `q` parameter: keyword plus an optional `language:` qualifier.
    pub fn query_string(&self) -> String {
        match &self.language {
            Some(lang) => format!("{} language:{}", self.keyword.trim(), lang),
            None => self.keyword.trim().to_string(),
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: u64,
    full_name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    html_url: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    language: Option<String>,
}

impl From<SearchItem> for Repository {
    fn from(item: SearchItem) -> Self {
        Self {
            id: item.id,
            name: item.full_name.unwrap_or_else(|| "Unknown".into()),
            description: item
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| NO_DESCRIPTION.into()),
            language: item.language.unwrap_or_else(|| UNKNOWN_LANGUAGE.into()),
            stars: item.stargazers_count,
            url: item.html_url.unwrap_or_default(),
            topics: item.topics,
        }
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Thin client over the GitHub REST search endpoint.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Search repositories matching `query`, ordered descending by the sort key.
    ///
    /// Never returns more than `query.max_results` records.
    pub async fn search_repositories(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<Repository>, GitHubError> {
        let token = self.token.as_deref().ok_or(GitHubError::MissingToken)?;

        let cap = query.max_results.min(SEARCH_WINDOW);
        if cap == 0 {
            return Ok(Vec::new());
        }
        let per_page = cap.min(MAX_PER_PAGE);
        let q = query.query_string();

        info!(query = %q, cap, sort = %query.sort, "searching GitHub repositories");

        let mut repos: Vec<Repository> = Vec::with_capacity(cap);
        let mut page = 1usize;

        while repos.len() < cap && (page - 1) * per_page < SEARCH_WINDOW {
            let items = self.fetch_page(token, &q, query.sort, per_page, page).await?;
            let fetched = items.len();
            debug!(page, fetched, "search page received");

            repos.extend(items.into_iter().map(Repository::from));

            if fetched < per_page {
                break;
            }
            page += 1;
        }

        repos.truncate(cap);

        if repos.is_empty() {
            warn!(keyword = %query.keyword, "no repositories matched");
        } else {
            info!(count = repos.len(), "search complete");
        }

        Ok(repos)
    }

    async fn fetch_page(
        &self,
        token: &str,
        q: &str,
        sort: SortBy,
        per_page: usize,
        page: usize,
    ) -> Result<Vec<SearchItem>, GitHubError> {
        let url = Url::parse_with_params(
            &format!("{}/search/repositories", self.api_url),
            &[
                ("q", q.to_string()),
                ("sort", sort.as_str().to_string()),
                ("order", "desc".to_string()),
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
            ],
        )
        .map_err(|e| GitHubError::Api {
            status: 0,
            message: format!("invalid API URL {}: {e}", self.api_url),
        })?;

        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, concat!("galaxy/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?;

        let status = response.status();
        let limits = RateLimit::from_headers(response.headers());

        if let Some(remaining) = limits.remaining {
            if remaining < LOW_RATE_LIMIT {
                warn!(remaining, "GitHub API rate limit nearly exhausted");
            }
        }

        if status.is_success() {
            let body: SearchResponse = response.json().await.map_err(GitHubError::Decode)?;
            return Ok(body.items);
        }

        if limits.is_exhausted(status) {
            let wait_minutes = limits.wait_minutes(chrono::Utc::now().timestamp());
            return Err(GitHubError::RateLimited { wait_minutes });
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|b| b.message)
            .unwrap_or(text);
        Err(GitHubError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Rate-limit headers of a single response.
#[derive(Debug, Default, Clone, Copy)]
struct RateLimit {
    remaining: Option<u64>,
    reset: Option<i64>,
}

impl RateLimit {
    fn from_headers(headers: &HeaderMap) -> Self {
        let parse = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<i64>().ok())
        };
        Self {
            remaining: parse("x-ratelimit-remaining").map(|v| v.max(0) as u64),
            reset: parse("x-ratelimit-reset"),
        }
    }

    fn is_exhausted(&self, status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::FORBIDDEN && self.remaining == Some(0))
    }

    /// Whole minutes until the window resets, rounded up.
    fn wait_minutes(&self, now: i64) -> u64 {
        let secs = self.reset.map_or(0, |reset| (reset - now).max(0)) as u64;
        secs.div_ceil(60)
    }
}
