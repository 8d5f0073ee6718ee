//! Tag enumeration and release version detection.

use std::collections::HashSet;
use std::fmt;

use git2::{ObjectType, Oid, Repository};
use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, GitError};

const VERSION_PLACEHOLDER: &str = "{version}";

/// Tag name template such as `v{version}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagFormat {
    prefix: String,
    suffix: String,
}

impl TagFormat {
    /// Render the tag for a version.
    pub fn tag_name(&self, version: &Version) -> String {
        format!("{}{}{}", self.prefix, version, self.suffix)
    }

    /// Extract a stable release version from a tag name matching this template.
    ///
    /// Pre-release and build-metadata versions are not release tags.
    pub fn parse_version(&self, tag_name: &str) -> Option<Version> {
        let raw = tag_name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;
        Version::parse(raw)
            .ok()
            .filter(|v| v.pre.is_empty() && v.build.is_empty())
    }
}

impl Default for TagFormat {
    fn default() -> Self {
        Self {
            prefix: "v".to_string(),
            suffix: String::new(),
        }
    }
}

impl TryFrom<String> for TagFormat {
    type Error = ConfigError;

    fn try_from(template: String) -> Result<Self, Self::Error> {
        let Some((prefix, suffix)) = template.split_once(VERSION_PLACEHOLDER) else {
            return Err(ConfigError::Invalid(format!(
                "tag_format '{}' must contain {}",
                template, VERSION_PLACEHOLDER
            )));
        };
        if suffix.contains(VERSION_PLACEHOLDER) {
            return Err(ConfigError::Invalid(format!(
                "tag_format '{}' contains {} more than once",
                template, VERSION_PLACEHOLDER
            )));
        }
        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }
}

impl From<TagFormat> for String {
    fn from(format: TagFormat) -> Self {
        format.to_string()
    }
}

impl fmt::Display for TagFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.prefix, VERSION_PLACEHOLDER, self.suffix)
    }
}

/// A git tag, resolved to the commit it points at.
#[derive(Debug, Clone)]
pub struct TagInfo {
    pub name: String,
    pub oid: Oid,
    pub version: Option<Version>,
}

/// Every release tag whose commit is HEAD or one of its ancestors.
///
/// Tags that do not match `format`, pre-release tags and tags on other
/// branches are dropped. Order is unspecified.
pub fn reachable_release_tags(
    repo: &Repository,
    format: &TagFormat,
) -> Result<Vec<TagInfo>, GitError> {
    let Some(head_oid) = repo.head().ok().and_then(|head| head.target()) else {
        return Ok(Vec::new());
    };

    let mut releases: Vec<TagInfo> = get_all_tags(repo)?
        .into_iter()
        .filter_map(|mut tag| {
            tag.version = format.parse_version(&tag.name);
            tag.version.is_some().then_some(tag)
        })
        .collect();
    if releases.is_empty() {
        debug!(format = %format, "No release tags found in repository");
        return Ok(releases);
    }

    let mut revwalk = repo.revwalk().map_err(GitError::RevwalkError)?;
    revwalk.push(head_oid).map_err(GitError::RevwalkError)?;
    let ancestry = revwalk
        .collect::<Result<HashSet<Oid>, _>>()
        .map_err(GitError::RevwalkError)?;

    releases.retain(|tag| ancestry.contains(&tag.oid));
    debug!(count = releases.len(), "Collected reachable release tags");
    Ok(releases)
}

/// The highest release version among `tags`.
pub fn highest_release(tags: &[TagInfo]) -> Option<&TagInfo> {
    tags.iter().max_by(|a, b| a.version.cmp(&b.version))
}

/// Get the highest release tag reachable from HEAD.
///
/// Version order decides, not history order, so a maintenance tag merged
/// back into the release branch never shadows a newer release.
pub fn get_latest_reachable_tag(
    repo: &Repository,
    format: &TagFormat,
) -> Result<Option<TagInfo>, GitError> {
    let tags = reachable_release_tags(repo, format)?;
    let latest = highest_release(&tags).cloned();
    if let Some(tag) = &latest {
        debug!(tag = %tag.name, "Found latest reachable release tag");
    }
    Ok(latest)
}

/// List every tag with the object it finally points at.
///
/// Annotated tags are peeled through to their target. `version` is left
/// empty; callers parse it against their tag template.
pub fn get_all_tags(repo: &Repository) -> Result<Vec<TagInfo>, GitError> {
    let names = repo.tag_names(None).map_err(GitError::RevwalkError)?;

    let mut tags = Vec::with_capacity(names.len());
    for name in names.iter() {
        let Some(name) = name else {
            warn!("Skipping tag whose name is not valid UTF-8");
            continue;
        };

        let target = repo
            .find_reference(&format!("refs/tags/{}", name))
            .and_then(|reference| reference.peel(ObjectType::Any));
        match target {
            Ok(object) => tags.push(TagInfo {
                name: name.to_string(),
                oid: object.id(),
                version: None,
            }),
            Err(e) => debug!(tag = name, error = %e, "Skipping unresolvable tag"),
        }
    }

    Ok(tags)
}

/// Check if a tag already exists.
pub fn tag_exists(repo: &Repository, tag_name: &str) -> Result<bool, GitError> {
    match repo.find_reference(&format!("refs/tags/{}", tag_name)) {
        Ok(_) => Ok(true),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
        Err(e) => Err(GitError::ReferenceNotFound(tag_name.to_string(), e)),
    }
}
