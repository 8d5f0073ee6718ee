//! Semver calculation from change records.

use std::fmt;

use semver::Version;
use serde::Serialize;

use crate::git::{ChangeRecord, ChangeType};

/// Type of version bump, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
    None,
    Patch,
    Minor,
    Major,
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Patch => "patch",
            Self::Minor => "minor",
            Self::Major => "major",
        })
    }
}

impl ChangeRecord {
    /// The bump this record asks for on its own.
    pub fn bump(&self) -> BumpKind {
        if self.breaking {
            return BumpKind::Major;
        }
        match self.kind {
            ChangeType::Feat => BumpKind::Minor,
            ChangeType::Fix | ChangeType::Perf => BumpKind::Patch,
            ChangeType::Docs
            | ChangeType::Style
            | ChangeType::Chore
            | ChangeType::Refactor
            | ChangeType::Test
            | ChangeType::Ci
            | ChangeType::Other => BumpKind::None,
        }
    }
}

/// The outcome of folding a commit range into one version step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionDecision {
    pub previous: Version,
    pub next: Version,
    pub bump: BumpKind,
}

impl VersionDecision {
    /// Whether this decision cuts a release.
    pub fn is_release(&self) -> bool {
        self.bump != BumpKind::None
    }
}

/// Determine the highest bump requested by a set of records.
pub fn determine_bump(records: &[ChangeRecord]) -> BumpKind {
    records
        .iter()
        .map(ChangeRecord::bump)
        .max()
        .unwrap_or(BumpKind::None)
}

/// Apply a bump to a version.
///
/// Pre-release and build metadata are dropped. While the major version is 0 a
/// major bump only raises the minor version.
pub fn apply_bump(previous: &Version, bump: BumpKind) -> Version {
    let base = Version::new(previous.major, previous.minor, previous.patch);

    match bump {
        BumpKind::None => previous.clone(),
        BumpKind::Major if base.major == 0 => Version::new(0, base.minor + 1, 0),
        BumpKind::Major => Version::new(base.major + 1, 0, 0),
        BumpKind::Minor => Version::new(base.major, base.minor + 1, 0),
        BumpKind::Patch => Version::new(base.major, base.minor, base.patch + 1),
    }
}

/// Resolve the next version from the previous release and the records since it.
///
/// Without a previous release the baseline is `0.0.0`.
pub fn resolve(previous: Option<&Version>, records: &[ChangeRecord]) -> VersionDecision {
    let previous = previous.cloned().unwrap_or_else(|| Version::new(0, 0, 0));
    let bump = determine_bump(records);
    let next = apply_bump(&previous, bump);

    VersionDecision {
        previous,
        next,
        bump,
    }
}
