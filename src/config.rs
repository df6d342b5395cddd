use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::embedding::EmbeddingMethod;
use crate::reduce::ReductionMethod;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct GalaxyConfig {
    pub server: ServerConfig,
    pub github: GitHubConfig,
    pub embedding: EmbeddingConfig,
    pub reduction: ReductionConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub default_max_results: usize,
    /// Upper bound accepted from the form or the command line.
    pub max_results_cap: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `local` or `gemini`.
    pub method: String,
    pub local_model: String,
    pub cache_dir: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReductionConfig {
    /// `tsne` or `pca`.
    pub method: String,
    /// Upper bound for the automatically chosen t-SNE perplexity.
    pub perplexity: f64,
    pub max_iter: usize,
    pub seed: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8501".into(),
            log_level: "info".into(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".into(),
            token: None,
            default_max_results: 30,
            max_results_cap: 100,
            timeout_secs: 30,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_galaxy_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            method: "local".into(),
            local_model: "all-MiniLM-L6-v2".into(),
            cache_dir,
            gemini_api_key: None,
            gemini_model: "text-embedding-004".into(),
            gemini_api_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            timeout_secs: 60,
        }
    }
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            method: "tsne".into(),
            perplexity: 5.0,
            max_iter: 1000,
            seed: 42,
        }
    }
}

impl EmbeddingConfig {
    /// Parse the configured embedding method.
    pub fn method(&self) -> Result<EmbeddingMethod> {
        self.method
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
    }
}

impl ReductionConfig {
    pub fn method(&self) -> Result<ReductionMethod> {
        self.method
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
    }
}

/// Returns `~/.galaxy/`
pub fn default_galaxy_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".galaxy")
}

/// Returns the default config file path: `~/.galaxy/config.toml`
pub fn default_config_path() -> PathBuf {
    default_galaxy_dir().join("config.toml")
}

impl GalaxyConfig {
    /// Load `.env`, the TOML file (if it exists), then apply env var overrides.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            info!(path = %path.display(), "loaded .env");
        }
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            GalaxyConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (GITHUB_TOKEN, GEMINI_API_KEY,
    /// EMBEDDING_METHOD, GALAXY_LOG_LEVEL, GALAXY_BIND). Empty values are ignored.
    fn apply_env_overrides(&mut self) {
        if let Some(val) = non_empty_env("GITHUB_TOKEN") {
            self.github.token = Some(val);
        }
        if let Some(val) = non_empty_env("GEMINI_API_KEY") {
            self.embedding.gemini_api_key = Some(val);
        }
        if let Some(val) = non_empty_env("EMBEDDING_METHOD") {
            self.embedding.method = val;
        }
        if let Some(val) = non_empty_env("GALAXY_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Some(val) = non_empty_env("GALAXY_BIND") {
            self.server.bind = val;
        }
    }

    /// Check that the credentials the configured pipeline needs are present.
    /// Returns one human-readable message per problem; empty means ready.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.github.token.as_deref().map_or(true, str::is_empty) {
            errors.push(
                "GITHUB_TOKEN is missing. Set it in .env or the environment \
                 (GitHub Settings > Developer settings > Personal access tokens)."
                    .to_string(),
            );
        }

        match self.embedding.method() {
            Ok(EmbeddingMethod::Gemini)
                if self.embedding.gemini_api_key.as_deref().map_or(true, str::is_empty) =>
            {
                errors.push(
                    "EMBEDDING_METHOD is 'gemini' but GEMINI_API_KEY is missing.".to_string(),
                );
            }
            Ok(_) => {}
            Err(e) => errors.push(e.to_string()),
        }

        if let Err(e) = self.reduction.method() {
            errors.push(e.to_string());
        }

        errors
    }

    /// Clamp a requested result count into `1..=max_results_cap`.
    pub fn clamp_max_results(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.github.default_max_results)
            .clamp(1, self.github.max_results_cap.max(1))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
