//! herald - cut versioned releases from conventional commits.
//!
//! # Overview
//!
//! herald classifies the commits since the last release tag, decides the next
//! semantic version, prepends release notes to CHANGELOG.md in Keep a Changelog
//! format, bumps version manifests, creates the release commit and tag, and
//! publishes the release with its build artifacts to GitHub.

pub mod changelog;
pub mod config;
pub mod error;
pub mod git;
pub mod github;
pub mod retry;
pub mod ship;
pub mod version;

// Re-export commonly used types
pub use changelog::ReleaseNotes;
pub use config::ReleaseConfig;
pub use error::{
    ChangelogError, ConfigError, GitError, ManifestError, PublishError, ReleaseError, WriteError,
};
pub use git::{ChangeRecord, ChangeType};
pub use ship::{NoOpReason, Orchestrator, ReleaseOutcome, ReleaseStage};
pub use version::{BumpKind, VersionDecision};
