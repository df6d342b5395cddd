//! CLI `explore` command: run one exploration and write the map to disk.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::ProgressBar;

use galaxy::config::GalaxyConfig;
use galaxy::embedding::{EmbeddingMethod, ProviderCache};
use galaxy::github::{GitHubClient, SortBy};
use galaxy::pipeline::{self, ExploreRequest, Exploration};
use galaxy::reduce::{ReductionMethod, ReductionParams};
use galaxy::render::{self, ColorBy, ScatterOptions};

#[derive(Debug, Args)]
pub struct ExploreArgs {
    /// Search keyword, e.g. "web framework"
    pub keyword: String,

    /// Maximum number of repositories to map
    #[arg(short = 'n', long)]
    pub max_results: Option<usize>,

    /// Restrict to one primary language
    #[arg(short, long)]
    pub language: Option<String>,

    /// Embedding method: local or gemini (defaults to EMBEDDING_METHOD)
    #[arg(short, long)]
    pub method: Option<EmbeddingMethod>,

    /// Sort key for the search: stars, forks or updated
    #[arg(long, default_value = "stars")]
    pub sort: SortBy,

    /// Reduction method: tsne or pca
    #[arg(long)]
    pub reducer: Option<ReductionMethod>,

    /// Explicit t-SNE perplexity
    #[arg(long)]
    pub perplexity: Option<f64>,

    /// Marker color: language or stars
    #[arg(long, default_value = "language")]
    pub color_by: ColorBy,

    /// Draw repository names next to points (30 results or fewer)
    #[arg(long)]
    pub labels: bool,

    /// HTML output path
    #[arg(short, long, default_value = "galaxy.html")]
    pub output: PathBuf,

    /// Also write the mapped repositories as CSV
    #[arg(long)]
    pub csv: Option<PathBuf>,
}

pub async fn explore(config: &GalaxyConfig, args: ExploreArgs) -> Result<()> {
    let problems = config.validate();
    if !problems.is_empty() {
        println!("Configuration errors:");
        for p in &problems {
            println!("  - {p}");
        }
        println!("Create a .env file or set the variables, then retry. See `galaxy doctor`.");
        return Ok(());
    }

    let method = match args.method {
        Some(m) => m,
        None => config.embedding.method()?,
    };
    let mut params = ReductionParams::from(&config.reduction);
    if let Some(reducer) = args.reducer {
        params.method = reducer;
    }
    params.perplexity = args.perplexity;

    let github = GitHubClient::new(&config.github)?;
    let providers = ProviderCache::new(config.embedding.clone());

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("loading {method} embedding provider..."));
    let provider = providers
        .get(method)
        .await
        .context("failed to create embedding provider")?;

    let request = ExploreRequest {
        sort: args.sort,
        ..ExploreRequest::new(args.keyword.clone(), config.clamp_max_results(args.max_results))
            .with_language(args.language.clone())
    };

    spinner.set_message(format!("exploring '{}'...", request.keyword));
    let outcome = pipeline::explore(&github, provider.as_ref(), &params, &request).await;
    spinner.finish_and_clear();

    let galaxy = match outcome? {
        Exploration::Empty { keyword } => {
            println!("No repositories matched '{keyword}'. Try another keyword.");
            return Ok(());
        }
        Exploration::Galaxy(galaxy) => galaxy,
    };

    let opts = ScatterOptions {
        color_by: args.color_by,
        show_labels: args.labels,
        ..ScatterOptions::for_keyword(&galaxy.keyword)
    };
    std::fs::write(&args.output, render::standalone_page(&galaxy, &opts))
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    if let Some(csv_path) = &args.csv {
        std::fs::write(csv_path, render::to_csv(&galaxy.points))
            .with_context(|| format!("failed to write {}", csv_path.display()))?;
        println!("CSV written to {}", csv_path.display());
    }

    let s = &galaxy.summary;
    println!("Semantic map of '{}'", galaxy.keyword);
    println!("{}", "=".repeat(40));
    println!("  Repositories:        {}", s.total_repos);
    println!("  Total stars:         {}", render::format_thousands(s.total_stars));
    println!("  Top language:        {}", s.top_language);
    println!("  Average stars:       {}", render::format_thousands(s.avg_stars));
    println!("  Embedding:           {} ({} dims)", galaxy.method.label(), galaxy.dimensions);
    println!();
    println!("Map written to {}", args.output.display());

    Ok(())
}
