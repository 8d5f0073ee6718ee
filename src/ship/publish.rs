//! Artifact resolution and upload to the release host.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::PublishError;
use crate::retry::retry_with_backoff;

/// A build output to attach to the release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Glob relative to the build directory.
    pub pattern: String,
    /// Remote file name. Only valid when the pattern matches one file.
    #[serde(default)]
    pub target_name: Option<String>,
    /// Zero matches is a warning instead of an error.
    #[serde(default)]
    pub optional: bool,
}

impl Artifact {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            target_name: None,
            optional: false,
        }
    }

    pub fn named(pattern: &str, target_name: &str) -> Self {
        Self {
            target_name: Some(target_name.to_string()),
            ..Self::new(pattern)
        }
    }
}

/// A matched file and the name it is uploaded as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub path: PathBuf,
    pub name: String,
}

/// A release object on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRelease {
    pub id: u64,
    pub tag: String,
    pub html_url: Option<String>,
    /// Names of assets already attached.
    pub assets: Vec<String>,
}

/// Where releases are published.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleaseHost: Send + Sync {
    /// Look up the release for a tag.
    async fn find_release(&self, tag: &str) -> Result<Option<RemoteRelease>, PublishError>;

    /// Create a release for an existing tag.
    async fn create_release(
        &self,
        tag: &str,
        name: &str,
        body: &str,
    ) -> Result<RemoteRelease, PublishError>;

    /// Attach one file to a release.
    async fn upload_asset(
        &self,
        release_id: u64,
        name: &str,
        data: Vec<u8>,
    ) -> Result<(), PublishError>;
}

/// What a publish run did.
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub release: RemoteRelease,
    pub uploaded: Vec<String>,
    /// Already present on the release, typically from an earlier attempt.
    pub skipped: Vec<String>,
}

/// Expand every artifact pattern against `build_dir`.
///
/// Matches are files only, sorted by path. Fails on a required artifact with
/// no matches, a `target_name` with several matches, or two matches that
/// would upload under the same name.
pub fn resolve_artifacts(
    build_dir: &Path,
    artifacts: &[Artifact],
) -> Result<Vec<ResolvedArtifact>, PublishError> {
    let base = build_dir
        .to_str()
        .ok_or_else(|| PublishError::InvalidPattern {
            pattern: build_dir.display().to_string(),
            reason: "build directory is not valid UTF-8".to_string(),
        })?;

    let mut resolved = Vec::new();
    let mut names = HashSet::new();

    for artifact in artifacts {
        let full_pattern = format!("{}/{}", Pattern::escape(base), artifact.pattern);
        let entries = glob::glob(&full_pattern).map_err(|e| PublishError::InvalidPattern {
            pattern: artifact.pattern.clone(),
            reason: e.msg.to_string(),
        })?;

        let mut matches: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable artifact path");
                    None
                }
            })
            .filter(|path| path.is_file())
            .collect();
        matches.sort();

        if matches.is_empty() {
            if artifact.optional {
                warn!(pattern = %artifact.pattern, "Optional artifact matched no files");
                continue;
            }
            return Err(PublishError::ArtifactMissing {
                pattern: artifact.pattern.clone(),
                dir: build_dir.to_path_buf(),
            });
        }

        if let Some(target) = &artifact.target_name
            && matches.len() > 1
        {
            return Err(PublishError::ArtifactAmbiguous {
                pattern: artifact.pattern.clone(),
                target: target.clone(),
                count: matches.len(),
            });
        }

        for path in matches {
            let name = match &artifact.target_name {
                Some(target) => target.clone(),
                None => file_name(&path),
            };
            if !names.insert(name.clone()) {
                return Err(PublishError::DuplicateAssetName(name));
            }
            debug!(path = %path.display(), name = %name, "Resolved artifact");
            resolved.push(ResolvedArtifact { path, name });
        }
    }

    Ok(resolved)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn exhausted(e: PublishError) -> PublishError {
    PublishError::RetriesExhausted(Box::new(e))
}

/// Publish the release for `tag` and upload every artifact.
///
/// Artifacts are resolved before the host is contacted. An existing release
/// for the tag is reused and assets it already carries are skipped, so a
/// resumed run only uploads what is missing. Uploads run concurrently.
pub async fn publish_release(
    host: Arc<dyn ReleaseHost>,
    tag: &str,
    notes: &str,
    build_dir: &Path,
    artifacts: &[Artifact],
) -> Result<PublishReport, PublishError> {
    let resolved = resolve_artifacts(build_dir, artifacts)?;

    let release = retry_with_backoff(
        "create release",
        || {
            let host = Arc::clone(&host);
            async move {
                // Look up first on every attempt so a create that landed
                // before a transport error is not repeated
                match host.find_release(tag).await? {
                    Some(existing) => {
                        debug!(tag, id = existing.id, "Reusing existing release");
                        Ok(existing)
                    }
                    None => host.create_release(tag, tag, notes).await,
                }
            }
        },
        PublishError::is_transient,
        exhausted,
    )
    .await?;

    let existing: HashSet<&str> = release.assets.iter().map(String::as_str).collect();
    let (skipped, pending): (Vec<ResolvedArtifact>, Vec<ResolvedArtifact>) = resolved
        .into_iter()
        .partition(|a| existing.contains(a.name.as_str()));

    for artifact in &skipped {
        info!(asset = %artifact.name, "Asset already uploaded, skipping");
    }

    let mut uploads = JoinSet::new();
    for artifact in pending {
        let host = Arc::clone(&host);
        let release_id = release.id;
        uploads.spawn(async move {
            let data = tokio::fs::read(&artifact.path)
                .await
                .map_err(|source| PublishError::ReadArtifact {
                    path: artifact.path.clone(),
                    source,
                })?;

            retry_with_backoff(
                "upload asset",
                || {
                    let host = Arc::clone(&host);
                    let data = data.clone();
                    let name = artifact.name.clone();
                    async move {
                        match host.upload_asset(release_id, &name, data).await {
                            // An earlier attempt landed but its response was lost
                            Err(PublishError::AssetExists(existing)) => {
                                debug!(asset = %existing, "Asset already on the release");
                                Ok(())
                            }
                            other => other,
                        }
                    }
                },
                PublishError::is_transient,
                exhausted,
            )
            .await?;

            info!(asset = %artifact.name, "Uploaded asset");
            Ok::<String, PublishError>(artifact.name)
        });
    }

    let mut uploaded = Vec::new();
    let mut first_error = None;
    while let Some(joined) = uploads.join_next().await {
        match joined {
            Ok(Ok(name)) => uploaded.push(name),
            Ok(Err(e)) => {
                warn!(error = %e, "Asset upload failed");
                first_error.get_or_insert(e);
            }
            Err(e) => {
                first_error.get_or_insert(PublishError::Transport(format!(
                    "upload task failed: {}",
                    e
                )));
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    uploaded.sort();
    Ok(PublishReport {
        release,
        uploaded,
        skipped: skipped.into_iter().map(|a| a.name).collect(),
    })
}
