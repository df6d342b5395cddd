//! GitHub Galaxy Explorer: semantic maps of GitHub search results.
//!
//! A keyword search against the GitHub API is turned into a 2D scatter plot in
//! which repositories with similar descriptions sit close together:
//!
//! 1. [`github`] fetches up to N repositories for a keyword.
//! 2. [`embedding`] turns each description into a vector, either with a local
//!    all-MiniLM-L6-v2 model (ONNX Runtime) or the Gemini embedding API.
//! 3. [`reduce`] projects the vectors to 2D with t-SNE (or PCA).
//! 4. [`render`] draws an interactive Plotly chart.
//!
//! [`pipeline`] chains the stages; [`server`] exposes them as a small web UI.
//!
//! # Modules
//!
//! - [`config`] — Configuration from `.env`, a TOML file and environment variables
//! - [`github`] — Repository search client
//! - [`embedding`] — Text-to-vector providers
//! - [`reduce`] — Dimensionality reduction
//! - [`render`] — Plotly figures, HTML pages, CSV export
//! - [`pipeline`] — query → fetch → vectorize → reduce
//! - [`server`] — axum web front end

pub mod config;
pub mod embedding;
pub mod github;
pub mod pipeline;
pub mod reduce;
pub mod render;
pub mod server;
