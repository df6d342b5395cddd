//! Local web front end.
//!
//! `GET /` renders the sidebar form and, when a keyword is submitted, the
//! semantic map. `GET /export.csv` and `GET /api/explore` run the same
//! exploration and return CSV or JSON. Explorations are serialised: one
//! interaction runs at a time, and the most recent result is kept so the CSV
//! download does not search again.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::GalaxyConfig;
use crate::embedding::{EmbeddingMethod, ProviderCache};
use crate::github::{GitHubClient, GitHubError};
use crate::pipeline::{self, ExploreError, ExploreRequest, Exploration, Galaxy};
use crate::reduce::ReductionParams;
use crate::render::{self, escape_html, ColorBy, ScatterOptions};

pub const LANGUAGES: &[&str] = &[
    "All",
    "Python",
    "JavaScript",
    "TypeScript",
    "Go",
    "Rust",
    "Java",
    "C++",
];

const MIN_RESULTS: usize = 10;
const RESULT_STEP: usize = 5;

const EXAMPLES: &[(&str, &str)] = &[
    ("machine learning", "explore machine learning projects"),
    ("web framework", "compare web frameworks"),
    ("data visualization", "discover visualization tools"),
    ("blockchain", "survey the blockchain ecosystem"),
];

#[derive(Clone)]
pub struct AppState {
    config: Arc<GalaxyConfig>,
    github: GitHubClient,
    providers: Arc<ProviderCache>,
    params: ReductionParams,
    /// Held for the whole exploration; also guards the last-result cache.
    gate: Arc<Mutex<Option<(RequestKey, Exploration)>>>,
}

/// Identity of a submission for the last-result cache.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestKey {
    keyword: String,
    max_results: usize,
    language: Option<String>,
    method: EmbeddingMethod,
}

impl AppState {
    pub fn new(config: GalaxyConfig) -> Result<Self> {
        let github = GitHubClient::new(&config.github)?;
        let providers = Arc::new(ProviderCache::new(config.embedding.clone()));
        let params = ReductionParams::from(&config.reduction);
        Ok(Self {
            config: Arc::new(config),
            github,
            providers,
            params,
            gate: Arc::new(Mutex::new(None)),
        })
    }

    pub fn providers(&self) -> &ProviderCache {
        &self.providers
    }
}

/// Sidebar form fields, all optional so a bare `GET /` parses.
#[derive(Debug, Default, Deserialize)]
pub struct ExploreForm {
    pub keyword: Option<String>,
    pub max_results: Option<usize>,
    pub language: Option<String>,
    pub method: Option<String>,
    pub color_by: Option<String>,
    /// HTML checkbox: present ("on") when ticked.
    pub labels: Option<String>,
}

impl ExploreForm {
    fn language_filter(&self) -> Option<String> {
        self.language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty() && *l != "All")
            .map(str::to_string)
    }

    fn color_by(&self) -> ColorBy {
        self.color_by
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or_default()
    }

    fn show_labels(&self) -> bool {
        self.labels.is_some()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/export.csv", get(export_csv))
        .route("/api/explore", get(api_explore))
        .with_state(state)
}

/// Start the web UI on `config.server.bind`.
pub async fn serve(config: GalaxyConfig) -> Result<()> {
    let bind_addr = config.server.bind.clone();

    for problem in config.validate() {
        tracing::warn!(%problem, "configuration problem; the UI will show setup instructions");
    }

    let app = router(AppState::new(config)?);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Galaxy Explorer listening at http://{bind_addr}/");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutting down web UI");
            }
        })
        .await?;

    Ok(())
}

/// Outcome of one form submission, before rendering.
enum Outcome {
    Setup(Vec<String>),
    Failed(StatusCode, String),
    Done(Exploration),
}

async fn run(state: &AppState, form: &ExploreForm) -> Outcome {
    let errors = state.config.validate();
    if !errors.is_empty() {
        return Outcome::Setup(errors);
    }

    let keyword = form.keyword.clone().unwrap_or_default();
    let method = match form.method.as_deref() {
        Some(m) => m.parse::<EmbeddingMethod>(),
        None => state.config.embedding.method().map_err(|e| e.to_string()),
    };
    let method = match method {
        Ok(m) => m,
        Err(e) => return Outcome::Failed(StatusCode::BAD_REQUEST, e),
    };

    let request = ExploreRequest::new(keyword, state.config.clamp_max_results(form.max_results))
        .with_language(form.language_filter());

    let key = RequestKey {
        keyword: request.keyword.trim().to_string(),
        max_results: request.max_results,
        language: request.language.clone(),
        method,
    };

    let mut last = state.gate.lock().await;
    if let Some((cached_key, exploration)) = last.as_ref() {
        if *cached_key == key {
            tracing::debug!(keyword = %key.keyword, "serving cached exploration");
            return Outcome::Done(exploration.clone());
        }
    }

    let provider = match state.providers.get(method).await {
        Ok(p) => p,
        Err(e) => return Outcome::Failed(StatusCode::SERVICE_UNAVAILABLE, format!("{e:#}")),
    };

    match pipeline::explore(&state.github, provider.as_ref(), &state.params, &request).await {
        Ok(exploration) => {
            *last = Some((key, exploration.clone()));
            Outcome::Done(exploration)
        }
        Err(e) => {
            tracing::warn!(error = %e, keyword = %request.keyword, "exploration failed");
            Outcome::Failed(status_for(&e), e.to_string())
        }
    }
}

fn status_for(err: &ExploreError) -> StatusCode {
    match err {
        ExploreError::EmptyKeyword | ExploreError::Reduce(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ExploreError::Search(GitHubError::RateLimited { .. }) => StatusCode::TOO_MANY_REQUESTS,
        ExploreError::Search(GitHubError::MissingToken) => StatusCode::SERVICE_UNAVAILABLE,
        ExploreError::Search(_) | ExploreError::Embedding(_) => StatusCode::BAD_GATEWAY,
        ExploreError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn index(State(state): State<AppState>, Query(form): Query<ExploreForm>) -> Html<String> {
    let body = match form.keyword.as_deref() {
        None => intro_html(),
        Some(_) => match run(&state, &form).await {
            Outcome::Setup(_) => notice("error", "Fix the configuration to start exploring."),
            Outcome::Failed(_, message) => notice("error", &message),
            Outcome::Done(Exploration::Empty { keyword }) => notice(
                "warn",
                &format!("No repositories matched '{keyword}'. Try another keyword."),
            ),
            Outcome::Done(Exploration::Galaxy(galaxy)) => {
                galaxy_html(&galaxy, &form, state.config.clamp_max_results(form.max_results))
            }
        },
    };

    let errors = state.config.validate();
    let sidebar = if errors.is_empty() {
        sidebar_html(&state.config, &form)
    } else {
        setup_html(&errors)
    };

    Html(page(&sidebar, &body))
}

async fn export_csv(State(state): State<AppState>, Query(form): Query<ExploreForm>) -> Response {
    match run(&state, &form).await {
        Outcome::Done(Exploration::Galaxy(galaxy)) => {
            let filename = csv_filename(&galaxy.keyword);
            (
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename}\""),
                    ),
                ],
                render::to_csv(&galaxy.points),
            )
                .into_response()
        }
        Outcome::Done(Exploration::Empty { keyword }) => {
            (StatusCode::NOT_FOUND, format!("no repositories matched '{keyword}'")).into_response()
        }
        Outcome::Setup(errors) => (StatusCode::SERVICE_UNAVAILABLE, errors.join("\n")).into_response(),
        Outcome::Failed(status, message) => (status, message).into_response(),
    }
}

async fn api_explore(State(state): State<AppState>, Query(form): Query<ExploreForm>) -> Response {
    match run(&state, &form).await {
        Outcome::Done(exploration) => Json(exploration).into_response(),
        Outcome::Setup(errors) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "configuration", "details": errors })),
        )
            .into_response(),
        Outcome::Failed(status, message) => {
            (status, Json(serde_json::json!({ "error": message }))).into_response()
        }
    }
}

fn page(sidebar: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>GitHub Galaxy Explorer</title>
<script src="{cdn}"></script>
<style>{style}
.layout {{ display: flex; min-height: 100vh; }}
aside {{ width: 300px; padding: 1.5rem; background: #f4f6fa; }}
aside label {{ display: block; margin-top: 1rem; font-weight: bold; }}
aside input[type=text], aside select {{ width: 100%; }}
aside button {{ margin-top: 1.5rem; width: 100%; padding: 0.6rem; }}
main {{ flex: 1; }}
</style>
</head>
<body>
<div class="layout">
<aside>{sidebar}</aside>
<main>
<h1>🌌 GitHub Galaxy Explorer</h1>
<p>Enter a keyword and get a 2D semantic map of matching GitHub projects: similar projects cluster together.</p>
{body}
</main>
</div>
</body>
</html>
"#,
        cdn = render::PLOTLY_CDN,
        style = render::STYLE,
    )
}

fn notice(kind: &str, message: &str) -> String {
    format!(r#"<div class="notice {kind}">{}</div>"#, escape_html(message))
}

fn setup_html(errors: &[String]) -> String {
    let items: String = errors
        .iter()
        .map(|e| format!("<li>{}</li>", escape_html(e)))
        .collect();
    format!(
        r#"<div class="notice error"><strong>Configuration error</strong><ul>{items}</ul>
<p>Create a <code>.env</code> file in the working directory or set the variables in your environment.</p></div>"#
    )
}

fn intro_html() -> String {
    let examples: String = EXAMPLES
        .iter()
        .map(|(kw, desc)| {
            format!(
                r#"<li><a href="/?keyword={}"><strong>{}</strong></a> — {}</li>"#,
                urlencoding::encode(kw),
                escape_html(kw),
                escape_html(desc)
            )
        })
        .collect();
    format!(
        r#"{}
<h2>Examples</h2>
<ul>{examples}</ul>"#,
        notice("info", "Set the search parameters on the left, then press Explore.")
    )
}

fn sidebar_html(config: &GalaxyConfig, form: &ExploreForm) -> String {
    let keyword = form.keyword.as_deref().unwrap_or("machine learning");
    let max_results = config.clamp_max_results(form.max_results);
    let cap = config.github.max_results_cap.max(MIN_RESULTS);
    let selected_language = form.language.as_deref().unwrap_or("All");
    let method = form
        .method
        .as_deref()
        .and_then(|m| m.parse::<EmbeddingMethod>().ok())
        .or_else(|| config.embedding.method().ok())
        .unwrap_or_default();
    let color_by = form.color_by();

    let languages: String = LANGUAGES
        .iter()
        .map(|lang| {
            let selected = if *lang == selected_language { " selected" } else { "" };
            format!(r#"<option value="{0}"{selected}>{0}</option>"#, escape_html(lang))
        })
        .collect();

    let methods: String = [EmbeddingMethod::Local, EmbeddingMethod::Gemini]
        .iter()
        .map(|m| {
            let checked = if *m == method { " checked" } else { "" };
            format!(
                r#"<div><input type="radio" name="method" value="{}"{checked}> {}</div>"#,
                m.as_str(),
                escape_html(m.label())
            )
        })
        .collect();

    let color_option = |value: &str, c: ColorBy| {
        let selected = if c == color_by { " selected" } else { "" };
        format!(r#"<option value="{value}"{selected}>{value}</option>"#)
    };

    format!(
        r#"<h2>⚙️ Settings</h2>
<form method="get" action="/">
<label for="keyword">Keyword</label>
<input type="text" id="keyword" name="keyword" value="{keyword}">
<label for="max_results">Results: <output id="n">{max_results}</output></label>
<input type="range" id="max_results" name="max_results" min="{MIN_RESULTS}" max="{cap}" step="{RESULT_STEP}" value="{max_results}" oninput="document.getElementById('n').value=this.value">
<label for="language">Language filter</label>
<select id="language" name="language">{languages}</select>
<label>Embedding method</label>
{methods}
<label for="color_by">Color by</label>
<select id="color_by" name="color_by">{lang_opt}{star_opt}</select>
<label><input type="checkbox" name="labels"{labels}> Show labels (≤ {max_labels} results)</label>
<button type="submit">🚀 Explore</button>
</form>"#,
        keyword = escape_html(keyword),
        lang_opt = color_option("language", ColorBy::Language),
        star_opt = color_option("stars", ColorBy::Stars),
        labels = if form.show_labels() { " checked" } else { "" },
        max_labels = render::MAX_LABELLED_POINTS,
    )
}

fn galaxy_html(galaxy: &Galaxy, form: &ExploreForm, max_results: usize) -> String {
    let opts = ScatterOptions {
        color_by: form.color_by(),
        show_labels: form.show_labels(),
        ..ScatterOptions::for_keyword(&galaxy.keyword)
    };
    let figure = render::scatter_figure(&galaxy.points, &opts);

    let csv_query = export_query(galaxy, form, max_results);

    format!(
        r#"{found}
<h2>🗺️ Semantic map</h2>
<p>Nearby points are semantically similar projects. Hover for details, click to open.</p>
{chart}
{summary}
<p><a href="/export.csv?{csv_query}">📥 Download CSV</a></p>"#,
        found = notice(
            "info",
            &format!(
                "Found {} repositories, embedded with {} ({} dimensions).",
                galaxy.summary.total_repos,
                galaxy.method.label(),
                galaxy.dimensions
            )
        ),
        chart = render::chart_html(&figure, "galaxy"),
        summary = render::summary_html(&galaxy.summary),
        csv_query = escape_html(&csv_query),
    )
}

/// Attachment name for a CSV download, restricted to `[A-Za-z0-9_-]`.
fn csv_filename(keyword: &str) -> String {
    let stem: String = keyword
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("github_galaxy_{stem}.csv")
}

/// Query string that repeats a submission against `/export.csv`.
fn export_query(galaxy: &Galaxy, form: &ExploreForm, max_results: usize) -> String {
    format!(
        "keyword={}&max_results={}&language={}&method={}",
        urlencoding::encode(&galaxy.keyword),
        max_results,
        urlencoding::encode(form.language.as_deref().unwrap_or("All")),
        galaxy.method,
    )
}
