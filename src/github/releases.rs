//! GitHub releases via octocrab.

use async_trait::async_trait;
use bytes::Bytes;
use octocrab::Octocrab;
use octocrab::models::repos::Release;
use tracing::debug;

use crate::error::PublishError;
use crate::ship::publish::{ReleaseHost, RemoteRelease};

/// A GitHub repository as a release host.
pub struct GitHubHost {
    client: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubHost {
    /// Build a client authenticated with a personal or CI token.
    pub fn new(token: &str, owner: &str, repo: &str) -> Result<Self, PublishError> {
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, owner, repo))
    }

    /// Use a pre-configured octocrab client.
    ///
    /// This allows dependency injection for testing with mock servers.
    pub fn with_client(client: Octocrab, owner: &str, repo: &str) -> Self {
        Self {
            client,
            owner: owner.to_string(),
            repo: repo.to_string(),
        }
    }

    /// Build a client for the repository behind a GitHub URL.
    pub fn from_url(token: &str, url: &str) -> Result<Self, PublishError> {
        let (owner, repo) = parse_github_remote(url)?;
        Self::new(token, &owner, &repo)
    }

    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn map_error(&self, e: octocrab::Error) -> PublishError {
        // Check error content using both Display and Debug output
        // to handle different octocrab error formats
        let err_display = e.to_string();
        let err_debug = format!("{:?}", e);

        if err_display.to_lowercase().contains("rate limit")
            || err_debug.to_lowercase().contains("rate limit")
        {
            return PublishError::RateLimited;
        }
        if err_display.contains("Bad credentials") || err_debug.contains("Bad credentials") {
            return PublishError::AuthenticationFailed;
        }
        if is_not_found(&e) {
            return PublishError::RepositoryNotFound {
                owner: self.owner.clone(),
                repo: self.repo.clone(),
            };
        }
        PublishError::Transport(err_display)
    }
}

fn is_not_found(e: &octocrab::Error) -> bool {
    e.to_string().contains("Not Found") || format!("{:?}", e).contains("Not Found")
}

fn to_remote(release: Release) -> RemoteRelease {
    RemoteRelease {
        id: release.id.0,
        tag: release.tag_name,
        html_url: Some(release.html_url.to_string()),
        assets: release.assets.into_iter().map(|a| a.name).collect(),
    }
}

#[async_trait]
impl ReleaseHost for GitHubHost {
    async fn find_release(&self, tag: &str) -> Result<Option<RemoteRelease>, PublishError> {
        match self
            .client
            .repos(&self.owner, &self.repo)
            .releases()
            .get_by_tag(tag)
            .await
        {
            Ok(release) => Ok(Some(to_remote(release))),
            // Missing release and missing repository look the same here;
            // creating the release surfaces the latter
            Err(e) if is_not_found(&e) => {
                debug!(tag, repo = %self.slug(), "No release for tag");
                Ok(None)
            }
            Err(e) => Err(self.map_error(e)),
        }
    }

    async fn create_release(
        &self,
        tag: &str,
        name: &str,
        body: &str,
    ) -> Result<RemoteRelease, PublishError> {
        let release = self
            .client
            .repos(&self.owner, &self.repo)
            .releases()
            .create(tag)
            .name(name)
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        debug!(tag, id = release.id.0, "Created release");
        Ok(to_remote(release))
    }

    async fn upload_asset(
        &self,
        release_id: u64,
        name: &str,
        data: Vec<u8>,
    ) -> Result<(), PublishError> {
        self.client
            .repos(&self.owner, &self.repo)
            .releases()
            .upload_asset(release_id, name, Bytes::from(data))
            .send()
            .await
            .map_err(|e| {
                if format!("{:?}", e).contains("already_exists") {
                    PublishError::AssetExists(name.to_string())
                } else {
                    self.map_error(e)
                }
            })?;
        Ok(())
    }
}

/// Extract owner and repo from a git remote or repository URL.
pub fn parse_github_remote(url: &str) -> Result<(String, String), PublishError> {
    let invalid = || PublishError::InvalidRepositoryUrl(url.to_string());

    // Handle SSH format: git@github.com:owner/repo.git
    if let Some(path) = url.strip_prefix("git@github.com:") {
        return parse_owner_repo_path(path).ok_or_else(invalid);
    }

    // Handle HTTPS and ssh:// formats: https://github.com/owner/repo.git
    if let Some(path) = url.split("github.com/").nth(1) {
        return parse_owner_repo_path(path).ok_or_else(invalid);
    }

    Err(invalid())
}

fn parse_owner_repo_path(path: &str) -> Option<(String, String)> {
    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let mut parts = path.split('/');

    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
            Some((owner.to_string(), repo.to_string()))
        }
        _ => None,
    }
}
