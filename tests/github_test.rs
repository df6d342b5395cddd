mod helpers;

use galaxy::github::{GitHubClient, GitHubError, SearchQuery, NO_DESCRIPTION};
use helpers::{github_client, github_config, mock_search_page};
use mockito::Matcher;

#[tokio::test]
async fn single_page_respects_cap() {
    let mut server = mockito::Server::new_async().await;
    // the API hands back more than asked for; the client must still cap
    let mock = mock_search_page(&mut server, "machine learning", 5, 1, 8).await;

    let repos = github_client(&server)
        .search_repositories(&SearchQuery::new("machine learning", 5))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(repos.len(), 5);
    assert_eq!(repos[0].name, "owner0/repo0");
    assert_eq!(repos[0].language, "Python");
    assert_eq!(repos[0].stars, 1000);
    assert_eq!(repos[2].description, NO_DESCRIPTION);
    assert_eq!(repos[1].topics, vec!["demo".to_string()]);
}

#[tokio::test]
async fn paginates_until_cap() {
    let mut server = mockito::Server::new_async().await;
    let page1 = mock_search_page(&mut server, "cli", 100, 1, 100).await;
    let page2 = mock_search_page(&mut server, "cli", 100, 2, 100).await;

    let repos = github_client(&server)
        .search_repositories(&SearchQuery::new("cli", 150))
        .await
        .unwrap();

    page1.assert_async().await;
    page2.assert_async().await;
    assert_eq!(repos.len(), 150);
    assert_eq!(repos[149].name, "owner149/repo149");
}

#[tokio::test]
async fn short_page_stops_pagination() {
    let mut server = mockito::Server::new_async().await;
    let page1 = mock_search_page(&mut server, "rare thing", 100, 1, 42).await;
    let page2 = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
        .expect(0)
        .create_async()
        .await;

    let repos = github_client(&server)
        .search_repositories(&SearchQuery::new("rare thing", 300))
        .await
        .unwrap();

    page1.assert_async().await;
    page2.assert_async().await;
    assert_eq!(repos.len(), 42);
}

#[tokio::test]
async fn search_window_caps_pagination_at_ten_pages() {
    let mut server = mockito::Server::new_async().await;
    let mut pages = Vec::new();
    for page in 1..=10 {
        pages.push(mock_search_page(&mut server, "popular", 100, page, 100).await);
    }
    let beyond = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::UrlEncoded("page".into(), "11".into()))
        .expect(0)
        .create_async()
        .await;

    let repos = github_client(&server)
        .search_repositories(&SearchQuery::new("popular", 1500))
        .await
        .unwrap();

    for page in &pages {
        page.assert_async().await;
    }
    beyond.assert_async().await;
    assert_eq!(repos.len(), 1000);
    assert_eq!(repos[999].name, "owner999/repo999");
}

#[tokio::test]
async fn language_filter_becomes_qualifier() {
    let mut server = mockito::Server::new_async().await;
    let mock = mock_search_page(&mut server, "web framework language:Rust", 10, 1, 3).await;

    let query = SearchQuery::new("web framework", 10).with_language(Some("Rust".into()));
    let repos = github_client(&server).search_repositories(&query).await.unwrap();

    mock.assert_async().await;
    assert_eq!(repos.len(), 3);
}

#[tokio::test]
async fn empty_result_is_ok() {
    let mut server = mockito::Server::new_async().await;
    mock_search_page(&mut server, "zzzz-nothing", 30, 1, 0).await;

    let repos = github_client(&server)
        .search_repositories(&SearchQuery::new("zzzz-nothing", 30))
        .await
        .unwrap();
    assert!(repos.is_empty());
}

#[tokio::test]
async fn rate_limit_is_reported_with_wait_time() {
    let mut server = mockito::Server::new_async().await;
    let reset = chrono::Utc::now().timestamp() + 120;
    server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_header("x-ratelimit-remaining", "0")
        .with_header("x-ratelimit-reset", &reset.to_string())
        .with_body(r#"{"message": "API rate limit exceeded"}"#)
        .create_async()
        .await;

    let err = github_client(&server)
        .search_repositories(&SearchQuery::new("rust", 10))
        .await
        .unwrap_err();

    match err {
        GitHubError::RateLimited { wait_minutes } => assert!((1..=2).contains(&wait_minutes)),
        other => panic!("expected rate limit error, got {other:?}"),
    }
}

#[tokio::test]
async fn too_many_requests_is_rate_limited() {
    let mut server = mockito::Server::new_async().await;
    let reset = chrono::Utc::now().timestamp() + 30;
    server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_header("x-ratelimit-reset", &reset.to_string())
        .with_body(r#"{"message": "secondary rate limit"}"#)
        .create_async()
        .await;

    let err = github_client(&server)
        .search_repositories(&SearchQuery::new("rust", 10))
        .await
        .unwrap_err();

    assert!(matches!(err, GitHubError::RateLimited { wait_minutes: 1 }), "{err:?}");
    assert!(err.to_string().contains("1 minute"));
}

#[tokio::test]
async fn api_error_message_is_verbatim() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::Any)
        .with_status(422)
        .with_header("x-ratelimit-remaining", "25")
        .with_body(r#"{"message": "Validation Failed", "documentation_url": "https://docs.github.com"}"#)
        .create_async()
        .await;

    let err = github_client(&server)
        .search_repositories(&SearchQuery::new("rust", 10))
        .await
        .unwrap_err();

    assert!(matches!(err, GitHubError::Api { status: 422, .. }));
    assert_eq!(err.to_string(), "GitHub API returned 422: Validation Failed");
}

#[tokio::test]
async fn missing_token_fails_before_any_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let mut config = github_config(&server.url());
    config.token = None;
    let err = GitHubClient::new(&config)
        .unwrap()
        .search_repositories(&SearchQuery::new("rust", 10))
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, GitHubError::MissingToken));
}
