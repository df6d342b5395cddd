mod helpers;

use galaxy::embedding::EmbeddingMethod;
use galaxy::server::{router, AppState};
use helpers::{app_config, mock_search_page, FakeProvider};

/// Serve the app on an ephemeral port and return its base URL.
async fn spawn_app(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

async fn state_with_fake(github_url: &str) -> (AppState, std::sync::Arc<FakeProvider>) {
    let state = AppState::new(app_config(github_url)).unwrap();
    let provider = FakeProvider::new(EmbeddingMethod::Local, 384);
    state.providers().insert(provider.clone()).await;
    (state, provider)
}

#[tokio::test]
async fn landing_page_shows_form_and_examples() {
    let github = mockito::Server::new_async().await;
    let (state, provider) = state_with_fake(&github.url()).await;
    let base = spawn_app(state).await;

    let html = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();

    assert!(html.contains("GitHub Galaxy Explorer"));
    assert!(html.contains(r#"name="keyword""#));
    assert!(html.contains(r#"<option value="C++">C++</option>"#));
    assert!(html.contains("web framework"));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn submitting_renders_map_and_summary() {
    let mut github = mockito::Server::new_async().await;
    mock_search_page(&mut github, "web framework", 10, 1, 10).await;
    let (state, provider) = state_with_fake(&github.url()).await;
    let base = spawn_app(state).await;

    let html = reqwest::get(format!(
        "{base}/?keyword=web+framework&max_results=10&language=All&method=local&color_by=stars&labels=on"
    ))
    .await
    .unwrap()
    .text()
    .await
    .unwrap();

    assert!(html.contains("Plotly.newPlot"));
    assert!(html.contains("Found 10 repositories"));
    assert!(html.contains("Top language"));
    assert!(html.contains("/export.csv?keyword=web%20framework"));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn csv_download_reuses_last_exploration() {
    let mut github = mockito::Server::new_async().await;
    let search = mock_search_page(&mut github, "cli", 10, 1, 10).await;
    let (state, provider) = state_with_fake(&github.url()).await;
    let base = spawn_app(state).await;

    let query = "keyword=cli&max_results=10&language=All&method=local";
    reqwest::get(format!("{base}/?{query}")).await.unwrap();
    let resp = reqwest::get(format!("{base}/export.csv?{query}")).await.unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"github_galaxy_cli.csv\""
    );
    let csv = resp.text().await.unwrap();
    assert!(csv.starts_with("name,description,stars,url,topics,language,x,y"));
    assert_eq!(csv.lines().count(), 11);

    search.assert_async().await;
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn csv_filename_strips_header_breaking_characters() {
    let mut github = mockito::Server::new_async().await;
    mock_search_page(&mut github, "say \"hi\"", 10, 1, 10).await;
    let (state, _provider) = state_with_fake(&github.url()).await;
    let base = spawn_app(state).await;

    let resp = reqwest::get(format!(
        "{base}/export.csv?keyword=say%20%22hi%22&max_results=10&method=local"
    ))
    .await
    .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"github_galaxy_say__hi_.csv\""
    );
}

#[tokio::test]
async fn api_reports_empty_state() {
    let mut github = mockito::Server::new_async().await;
    mock_search_page(&mut github, "nothing here", 30, 1, 0).await;
    let (state, provider) = state_with_fake(&github.url()).await;
    let base = spawn_app(state).await;

    let json: serde_json::Value = reqwest::get(format!("{base}/api/explore?keyword=nothing+here"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(json["status"], "empty");
    assert_eq!(json["keyword"], "nothing here");
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn api_returns_points() {
    let mut github = mockito::Server::new_async().await;
    mock_search_page(&mut github, "rust", 15, 1, 15).await;
    let (state, _provider) = state_with_fake(&github.url()).await;
    let base = spawn_app(state).await;

    let resp = reqwest::get(format!("{base}/api/explore?keyword=rust&max_results=15"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();

    assert_eq!(json["status"], "galaxy");
    assert_eq!(json["points"].as_array().unwrap().len(), 15);
    assert_eq!(json["points"][0]["name"], "owner0/repo0");
    assert!(json["points"][0]["x"].is_f64());
    assert_eq!(json["summary"]["total_repos"], 15);
}

#[tokio::test]
async fn single_result_is_unprocessable() {
    let mut github = mockito::Server::new_async().await;
    mock_search_page(&mut github, "lonely", 30, 1, 1).await;
    let (state, _provider) = state_with_fake(&github.url()).await;
    let base = spawn_app(state).await;

    let resp = reqwest::get(format!("{base}/api/explore?keyword=lonely"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert!(json["error"].as_str().unwrap().contains("at least 2"));
}

#[tokio::test]
async fn missing_token_shows_setup_message() {
    let github = mockito::Server::new_async().await;
    let mut config = app_config(&github.url());
    config.github.token = None;
    let base = spawn_app(AppState::new(config).unwrap()).await;

    let html = reqwest::get(format!("{base}/?keyword=rust"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("Configuration error"));
    assert!(html.contains("GITHUB_TOKEN"));

    let resp = reqwest::get(format!("{base}/api/explore?keyword=rust")).await.unwrap();
    assert_eq!(resp.status(), 503);
}
