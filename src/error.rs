//! Error types for herald modules using thiserror.

use std::path::PathBuf;

use semver::Version;
use thiserror::Error;

use crate::ship::ReleaseStage;

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Failed to open repository: {0}")]
    OpenRepository(#[source] git2::Error),

    #[error("Failed to find reference '{0}': {1}")]
    ReferenceNotFound(String, #[source] git2::Error),

    #[error("Failed to parse commit: {0}")]
    ParseCommit(#[source] git2::Error),

    #[error("Failed to walk commit history: {0}")]
    RevwalkError(#[source] git2::Error),

    #[error("Failed to read repository status: {0}")]
    StatusFailed(#[source] git2::Error),

    #[error("Bare repositories are not supported")]
    BareRepository,

    #[error("Failed to run git {operation}: {source}")]
    SpawnFailed {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {operation} failed: {stderr}")]
    CommandFailed { operation: String, stderr: String },
}

/// Errors from changelog operations.
#[derive(Error, Debug)]
pub enum ChangelogError {
    #[error("Failed to read changelog: {0}")]
    ReadFailed(#[source] std::io::Error),

    #[error("Failed to write changelog: {0}")]
    WriteFailed(#[source] std::io::Error),

    #[error("Failed to parse changelog: {0}")]
    ParseFailed(String),

    #[error("Changelog has no section for version {0}")]
    VersionNotFound(String),
}

/// Errors from reading or rewriting version manifests.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("No version field '{field}' in {path}")]
    MissingField { path: PathBuf, field: String },

    #[error("Cannot infer manifest format for {0}; set `format = \"toml\"` or `\"json\"`")]
    UnknownFormat(PathBuf),
}

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors from resolving artifacts or talking to the release host.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error(
        "GitHub authentication failed: no valid auth found. Run 'gh auth login' or set GITHUB_TOKEN environment variable"
    )]
    AuthenticationFailed,

    #[error("Failed to parse repository URL: {0}")]
    InvalidRepositoryUrl(String),

    #[error("Invalid artifact pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Required artifact '{pattern}' matched no files in {}", dir.display())]
    ArtifactMissing { pattern: String, dir: PathBuf },

    #[error("Artifact '{pattern}' matched {count} files but names a single target '{target}'")]
    ArtifactAmbiguous {
        pattern: String,
        target: String,
        count: usize,
    },

    #[error("More than one artifact uploads as '{0}'")]
    DuplicateAssetName(String),

    #[error("Failed to read artifact {path}: {source}")]
    ReadArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Rate limited by GitHub API")]
    RateLimited,

    #[error("Repository not found: {owner}/{repo}")]
    RepositoryNotFound { owner: String, repo: String },

    #[error("Release host request failed: {0}")]
    Transport(String),

    #[error("Asset '{0}' already exists on the release")]
    AssetExists(String),

    #[error("All retry attempts failed: {0}")]
    RetriesExhausted(#[source] Box<PublishError>),

    #[error("Artifacts are configured but no release host is available")]
    NoReleaseHost,
}

impl PublishError {
    /// Whether the request may succeed if sent again.
    pub fn is_transient(&self) -> bool {
        matches!(self, PublishError::Transport(_) | PublishError::RateLimited)
    }
}

/// Failures inside the write stage; every one of them triggers rollback.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Changelog(#[from] ChangelogError),

    #[error(transparent)]
    Git(#[from] GitError),
}

/// Errors from a release run, each tied to the stage that failed.
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Reading commit history failed: {0}")]
    History(#[source] GitError),

    #[error("Working tree has uncommitted changes. Commit or stash them before releasing.")]
    DirtyWorkingTree,

    #[error("Tag {0} already exists. Refusing to create it again.")]
    TagAlreadyExists(String),

    #[error("Writing release {version} failed, all changes were rolled back: {source}")]
    Write {
        version: Version,
        #[source]
        source: WriteError,
    },

    #[error(
        "Writing release {version} failed and rollback did not complete ({rollback}): {source}. Manual cleanup may be needed: {cleanup}"
    )]
    RollbackIncomplete {
        version: Version,
        #[source]
        source: WriteError,
        rollback: String,
        cleanup: String,
    },

    #[error(
        "Version {version} was bumped and tagged as {tag}, but publishing is incomplete: {source}. Re-run with --resume to retry publishing only."
    )]
    Publish {
        version: Version,
        tag: String,
        #[source]
        source: PublishError,
    },

    #[error("No release tag found to resume publishing from")]
    NothingToResume,

    #[error("Release notes for {tag} could not be recovered: {source}")]
    ResumeNotes {
        tag: String,
        #[source]
        source: ChangelogError,
    },
}

impl ReleaseError {
    /// The stage the run was in when this error ended it.
    pub fn stage(&self) -> ReleaseStage {
        match self {
            Self::History(_) => ReleaseStage::Classifying,
            Self::DirtyWorkingTree
            | Self::TagAlreadyExists(_)
            | Self::Write { .. }
            | Self::RollbackIncomplete { .. } => ReleaseStage::Writing,
            Self::Publish { .. } | Self::NothingToResume | Self::ResumeNotes { .. } => {
                ReleaseStage::Publishing
            }
        }
    }

    /// Whether the release tag exists in the repository at the time of failure.
    pub fn tag_created(&self) -> bool {
        matches!(self, Self::Publish { .. } | Self::ResumeNotes { .. })
    }

    /// Process exit code: 1 before the tag exists, 2 once it does.
    pub fn exit_code(&self) -> u8 {
        if self.tag_created() { 2 } else { 1 }
    }
}
