//! Configuration schema definitions.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::changelog::{SectionConfig, default_sections};
use crate::error::ConfigError;
use crate::git::TagFormat;
use crate::ship::manifest::ManifestEntry;
use crate::ship::publish::Artifact;

/// The main configuration structure for herald.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseConfig {
    /// Branches releases may be cut from. Empty means any branch.
    pub branches: Vec<String>,

    /// Tag template, must contain `{version}`.
    pub tag_format: TagFormat,

    /// Release commit message template. Supports `{version}` and `{tag}`.
    pub commit_message: String,

    /// Changelog path relative to the repository root.
    pub changelog: PathBuf,

    /// Repository URL on the release host. Falls back to the remote's URL.
    pub repository_url: Option<String>,

    /// Remote to push the release commit and tag to.
    pub remote: String,

    /// Push the release commit and tag after creating them.
    pub push: bool,

    /// Directory artifact patterns are resolved against.
    pub build_dir: PathBuf,

    /// Version fields to rewrite. Auto-detected when empty.
    pub manifests: Vec<ManifestEntry>,

    /// Additional files staged into the release commit when present (lockfiles).
    pub extra_assets: Vec<PathBuf>,

    /// Build outputs attached to the published release.
    pub artifacts: Vec<Artifact>,

    /// Changelog sections in display order.
    pub sections: Vec<SectionConfig>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            branches: vec!["main".to_string()],
            tag_format: TagFormat::default(),
            commit_message: "chore(release): {version} [skip ci]".to_string(),
            changelog: PathBuf::from("CHANGELOG.md"),
            repository_url: None,
            remote: "origin".to_string(),
            push: true,
            build_dir: PathBuf::from("build"),
            manifests: Vec::new(),
            extra_assets: Vec::new(),
            artifacts: Vec::new(),
            sections: default_sections(),
        }
    }
}

impl ReleaseConfig {
    /// Render the release commit message for a tag.
    pub fn commit_message_for(&self, version: &semver::Version, tag: &str) -> String {
        self.commit_message
            .replace("{version}", &version.to_string())
            .replace("{tag}", tag)
    }

    /// Whether a release may be cut from `branch`.
    pub fn is_release_branch(&self, branch: &str) -> bool {
        self.branches.is_empty() || self.branches.iter().any(|b| b == branch)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for section in &self.sections {
            if !seen.insert(section.kind) {
                return Err(ConfigError::Invalid(format!(
                    "commit type '{}' is listed in more than one section",
                    section.kind
                )));
            }
        }

        if let Some(artifact) = self.artifacts.iter().find(|a| a.pattern.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "artifact with target '{}' has an empty pattern",
                artifact.target_name.as_deref().unwrap_or("")
            )));
        }

        if let Some(entry) = self.manifests.iter().find(|m| m.field.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "manifest {} has an empty version field",
                entry.path.display()
            )));
        }

        Ok(())
    }
}
