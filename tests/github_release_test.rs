//! Integration tests for the GitHub release host with a mocked API.

use herald::PublishError;
use herald::github::GitHubHost;
use herald::ship::publish::ReleaseHost;
use octocrab::Octocrab;
use serde_json::{Map, Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mock_host(server: &MockServer) -> GitHubHost {
    let client = Octocrab::builder()
        .base_uri(server.uri())
        .expect("Failed to set base URI")
        .build()
        .expect("Failed to build octocrab");
    GitHubHost::with_client(client, "owner", "repo")
}

/// A user object with every field the GitHub API returns.
fn mock_user(login: &str, id: u64) -> Value {
    let api = format!("https://api.github.com/users/{}", login);
    let mut user = Map::new();
    user.insert("login".into(), json!(login));
    user.insert("id".into(), json!(id));
    user.insert("node_id".into(), json!(format!("MDQ6VXNlcnt{}", id)));
    user.insert(
        "avatar_url".into(),
        json!(format!("https://avatars.githubusercontent.com/u/{}?v=4", id)),
    );
    user.insert("gravatar_id".into(), json!(""));
    user.insert("url".into(), json!(api));
    user.insert("html_url".into(), json!(format!("https://github.com/{}", login)));
    user.insert("followers_url".into(), json!(format!("{}/followers", api)));
    user.insert("following_url".into(), json!(format!("{}/following{{/other_user}}", api)));
    user.insert("gists_url".into(), json!(format!("{}/gists{{/gist_id}}", api)));
    user.insert("starred_url".into(), json!(format!("{}/starred{{/owner}}{{/repo}}", api)));
    user.insert("subscriptions_url".into(), json!(format!("{}/subscriptions", api)));
    user.insert("organizations_url".into(), json!(format!("{}/orgs", api)));
    user.insert("repos_url".into(), json!(format!("{}/repos", api)));
    user.insert("events_url".into(), json!(format!("{}/events{{/privacy}}", api)));
    user.insert("received_events_url".into(), json!(format!("{}/received_events", api)));
    user.insert("type".into(), json!("User"));
    user.insert("site_admin".into(), json!(false));
    Value::Object(user)
}

fn mock_asset(id: u64, name: &str) -> Value {
    json!({
        "url": format!("https://api.github.com/repos/owner/repo/releases/assets/{}", id),
        "browser_download_url": format!("https://github.com/owner/repo/releases/download/v0.4.0/{}", name),
        "id": id,
        "node_id": format!("RA_{}", id),
        "name": name,
        "label": null,
        "state": "uploaded",
        "content_type": "application/octet-stream",
        "size": 1024,
        "download_count": 0,
        "created_at": "2026-10-01T12:00:00Z",
        "updated_at": "2026-10-01T12:00:00Z",
        "uploader": mock_user("releaser", 2)
    })
}

fn mock_release(id: u64, tag: &str, body: &str, assets: Vec<Value>) -> Value {
    let api = format!("https://api.github.com/repos/owner/repo/releases/{}", id);
    json!({
        "url": api,
        "html_url": format!("https://github.com/owner/repo/releases/tag/{}", tag),
        "assets_url": format!("{}/assets", api),
        "upload_url": format!("https://uploads.github.com/repos/owner/repo/releases/{}/assets{{?name,label}}", id),
        "tarball_url": format!("https://api.github.com/repos/owner/repo/tarball/{}", tag),
        "zipball_url": format!("https://api.github.com/repos/owner/repo/zipball/{}", tag),
        "id": id,
        "node_id": format!("RE_{}", id),
        "tag_name": tag,
        "target_commitish": "main",
        "name": tag,
        "body": body,
        "draft": false,
        "prerelease": false,
        "created_at": "2026-10-01T12:00:00Z",
        "published_at": "2026-10-01T12:00:00Z",
        "author": mock_user("releaser", 2),
        "assets": assets
    })
}

#[tokio::test]
async fn test_find_release_by_tag() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/owner/repo/releases/tags/v0.4.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_release(
            42,
            "v0.4.0",
            "### Features\n\n- y",
            vec![mock_asset(7, "app.zip")],
        )))
        .mount(&server)
        .await;

    let host = mock_host(&server).await;
    let release = host
        .find_release("v0.4.0")
        .await
        .expect("request should succeed")
        .expect("release should exist");

    assert_eq!(release.id, 42);
    assert_eq!(release.tag, "v0.4.0");
    assert_eq!(release.assets, vec!["app.zip"]);
    assert_eq!(
        release.html_url.as_deref(),
        Some("https://github.com/owner/repo/releases/tag/v0.4.0")
    );
}

#[tokio::test]
async fn test_find_missing_release_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/owner/repo/releases/tags/v9.9.9"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Not Found",
            "documentation_url": "https://docs.github.com/rest"
        })))
        .mount(&server)
        .await;

    let host = mock_host(&server).await;
    let release = host.find_release("v9.9.9").await.expect("404 is not an error");

    assert!(release.is_none());
}

#[tokio::test]
async fn test_create_release_sends_tag_name_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/owner/repo/releases"))
        .and(body_partial_json(json!({
            "tag_name": "v0.4.0",
            "name": "v0.4.0",
            "body": "### Features\n\n- y"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(mock_release(
            43,
            "v0.4.0",
            "### Features\n\n- y",
            Vec::new(),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let host = mock_host(&server).await;
    let release = host
        .create_release("v0.4.0", "v0.4.0", "### Features\n\n- y")
        .await
        .expect("release should be created");

    assert_eq!(release.id, 43);
    assert!(release.assets.is_empty());
}

#[tokio::test]
async fn test_rate_limit_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/owner/repo/releases"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "message": "API rate limit exceeded for user",
            "documentation_url": "https://docs.github.com/rest/overview/resources-in-the-rest-api#rate-limiting"
        })))
        .mount(&server)
        .await;

    let host = mock_host(&server).await;
    let result = host.create_release("v0.4.0", "v0.4.0", "").await;

    match result {
        Err(PublishError::RateLimited) => {}
        other => panic!("Expected RateLimited error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bad_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/owner/repo/releases"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "Bad credentials",
            "documentation_url": "https://docs.github.com/rest"
        })))
        .mount(&server)
        .await;

    let host = mock_host(&server).await;
    let result = host.create_release("v0.4.0", "v0.4.0", "").await;

    match result {
        Err(PublishError::AuthenticationFailed) => {}
        other => panic!("Expected AuthenticationFailed error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_in_missing_repository() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/owner/repo/releases"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Not Found",
            "documentation_url": "https://docs.github.com/rest"
        })))
        .mount(&server)
        .await;

    let host = mock_host(&server).await;
    let result = host.create_release("v0.4.0", "v0.4.0", "").await;

    match result {
        Err(PublishError::RepositoryNotFound { owner, repo }) => {
            assert_eq!(owner, "owner");
            assert_eq!(repo, "repo");
        }
        other => panic!("Expected RepositoryNotFound error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_host_slug_from_url() {
    let host = GitHubHost::from_url("token", "git@github.com:acme/widgets.git").unwrap();
    assert_eq!(host.slug(), "acme/widgets");
}
