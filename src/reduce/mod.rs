//! Dimensionality reduction to 2D for plotting.
//!
//! [`reduce`] validates the embedding matrix, picks the perplexity and runs
//! either exact t-SNE ([`tsne`]) or a linear PCA projection ([`pca`]). The
//! output always has one [`Point2`] per input vector, in input order.

pub mod pca;
pub mod tsne;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::ReductionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionMethod {
    #[default]
    Tsne,
    Pca,
}

impl ReductionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tsne => "tsne",
            Self::Pca => "pca",
        }
    }
}

impl std::fmt::Display for ReductionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReductionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tsne" | "t-sne" => Ok(Self::Tsne),
            "pca" => Ok(Self::Pca),
            other => Err(format!(
                "unsupported reduction method: {other}. Supported: tsne, pca"
            )),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ReduceError {
    #[error("at least 2 repositories are needed to draw a map, got {count}")]
    InsufficientData { count: usize },

    #[error("embedding {index} has {found} dimensions, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("embedding {index} contains a non-finite value")]
    NonFinite { index: usize },
}

#[derive(Debug, Clone)]
pub struct ReductionParams {
    pub method: ReductionMethod,
    /// Explicit perplexity; `None` picks one from the sample count.
    pub perplexity: Option<f64>,
    /// Upper bound for the automatic perplexity.
    pub perplexity_cap: f64,
    pub max_iter: usize,
    pub seed: u64,
}

impl Default for ReductionParams {
    fn default() -> Self {
        Self::from(&ReductionConfig::default())
    }
}

impl From<&ReductionConfig> for ReductionParams {
    fn from(config: &ReductionConfig) -> Self {
        Self {
            method: config.method().unwrap_or_default(),
            perplexity: None,
            perplexity_cap: config.perplexity,
            max_iter: config.max_iter,
            seed: config.seed,
        }
    }
}

impl ReductionParams {
    /// Perplexity actually used for `n` samples.
    ///
    /// Automatic choice is `min(cap, max(2, n / 10))`; any value is then
    /// clamped to `n - 1`, the largest neighbourhood that exists.
    pub fn effective_perplexity(&self, n: usize) -> f64 {
        let chosen = self
            .perplexity
            .unwrap_or_else(|| self.perplexity_cap.min((n / 10).max(2) as f64));
        chosen.min(n.saturating_sub(1) as f64).max(1.0)
    }
}

/// Project `vectors` to 2D.
pub fn reduce(vectors: &[Vec<f32>], params: &ReductionParams) -> Result<Vec<Point2>, ReduceError> {
    let data = to_matrix(vectors)?;
    let n = data.nrows();

    let coords = match params.method {
        ReductionMethod::Tsne => {
            let perplexity = params.effective_perplexity(n);
            tracing::info!(
                samples = n,
                dims = data.ncols(),
                perplexity,
                max_iter = params.max_iter,
                "running t-SNE"
            );
            tsne::fit(&data, perplexity, params.max_iter, params.seed)
        }
        ReductionMethod::Pca => {
            tracing::info!(samples = n, dims = data.ncols(), "running PCA");
            pca::fit(&data, params.seed)
        }
    };

    Ok(coords
        .rows()
        .into_iter()
        .map(|row| Point2 { x: row[0], y: row[1] })
        .collect())
}

fn to_matrix(vectors: &[Vec<f32>]) -> Result<Array2<f64>, ReduceError> {
    let n = vectors.len();
    if n < 2 {
        return Err(ReduceError::InsufficientData { count: n });
    }

    let dims = vectors[0].len();
    let mut data = Array2::<f64>::zeros((n, dims));
    for (i, v) in vectors.iter().enumerate() {
        if v.len() != dims || dims == 0 {
            return Err(ReduceError::DimensionMismatch {
                index: i,
                expected: dims,
                found: v.len(),
            });
        }
        if v.iter().any(|x| !x.is_finite()) {
            return Err(ReduceError::NonFinite { index: i });
        }
        for (j, &x) in v.iter().enumerate() {
            data[[i, j]] = x as f64;
        }
    }
    Ok(data)
}
