//! Commit history walking and conventional commit classification.

use std::fmt;
use std::sync::LazyLock;

use git2::{Oid, Repository, Sort};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GitError;

/// Pattern: type(scope)!: summary, type!: summary, type(scope): summary or type: summary
static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w+)(?:\(([^)]*)\))?(!)?\s*:\s*(.*)$").expect("header pattern is valid")
});

const BREAKING_FOOTERS: [&str; 2] = ["BREAKING CHANGE:", "BREAKING-CHANGE:"];

/// Conventional commit types. Anything unrecognised is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Feat,
    Fix,
    Perf,
    Docs,
    Style,
    Chore,
    Refactor,
    Test,
    Ci,
    Other,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feat => "feat",
            Self::Fix => "fix",
            Self::Perf => "perf",
            Self::Docs => "docs",
            Self::Style => "style",
            Self::Chore => "chore",
            Self::Refactor => "refactor",
            Self::Test => "test",
            Self::Ci => "ci",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "feat" => Ok(Self::Feat),
            "fix" => Ok(Self::Fix),
            "perf" => Ok(Self::Perf),
            "docs" => Ok(Self::Docs),
            "style" => Ok(Self::Style),
            "chore" => Ok(Self::Chore),
            "refactor" => Ok(Self::Refactor),
            "test" => Ok(Self::Test),
            "ci" => Ok(Self::Ci),
            _ => Err(format!("Unknown commit type: {}", s)),
        }
    }
}

/// One classified commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub kind: ChangeType,
    pub scope: Option<String>,
    pub summary: String,
    pub breaking: bool,
    pub hash: Option<String>,
}

impl ChangeRecord {
    /// Attach the id of the commit this record was parsed from.
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// First seven characters of the commit id, if known.
    pub fn short_hash(&self) -> Option<&str> {
        self.hash.as_deref().map(|h| &h[..h.len().min(7)])
    }
}

/// Classify a raw commit message.
///
/// Malformed or unknown headers never fail: they become `Other` records
/// carrying the whole first line as summary. A `!` marker or a
/// `BREAKING CHANGE:` footer flags the record as breaking whatever its type.
pub fn classify(message: &str) -> ChangeRecord {
    let first_line = message.lines().next().unwrap_or("").trim();

    let breaking_in_footer = message
        .lines()
        .skip(1)
        .map(str::trim_start)
        .any(|line| BREAKING_FOOTERS.iter().any(|f| line.starts_with(f)));

    if let Some(caps) = HEADER_RE.captures(first_line) {
        let type_str = caps.get(1).map_or("", |m| m.as_str());
        let scope = caps
            .get(2)
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .map(String::from);
        let breaking_mark = caps.get(3).is_some();
        let summary = caps.get(4).map_or("", |m| m.as_str().trim());

        if let (Ok(kind), false) = (type_str.parse::<ChangeType>(), summary.is_empty()) {
            return ChangeRecord {
                kind,
                scope,
                summary: summary.to_string(),
                breaking: breaking_mark || breaking_in_footer,
                hash: None,
            };
        }

        debug!(header = first_line, "Unrecognised commit header, classifying as other");
        return ChangeRecord {
            kind: ChangeType::Other,
            scope: None,
            summary: first_line.to_string(),
            breaking: breaking_mark || breaking_in_footer,
            hash: None,
        };
    }

    debug!(header = first_line, "Non-conventional commit header, classifying as other");
    ChangeRecord {
        kind: ChangeType::Other,
        scope: None,
        summary: first_line.to_string(),
        breaking: breaking_in_footer,
        hash: None,
    }
}

/// Classify every commit reachable from HEAD but not from any `released` commit.
///
/// Records come back newest first. Hiding every release boundary, not just
/// the latest, keeps back-merged maintenance releases from being counted
/// again. An empty slice returns the whole history, root commit included.
pub fn fetch_records(repo: &Repository, released: &[Oid]) -> Result<Vec<ChangeRecord>, GitError> {
    let head = repo
        .head()
        .map_err(|e| GitError::ReferenceNotFound("HEAD".to_string(), e))?
        .peel_to_commit()
        .map_err(GitError::ParseCommit)?;

    let mut revwalk = repo.revwalk().map_err(GitError::RevwalkError)?;
    revwalk
        .set_sorting(Sort::TOPOLOGICAL)
        .map_err(GitError::RevwalkError)?;
    revwalk.push(head.id()).map_err(GitError::RevwalkError)?;
    for oid in released {
        revwalk.hide(*oid).map_err(GitError::RevwalkError)?;
    }

    let mut records = Vec::new();
    for oid_result in revwalk {
        let oid = oid_result.map_err(GitError::RevwalkError)?;
        let commit = repo.find_commit(oid).map_err(GitError::ParseCommit)?;
        let message = String::from_utf8_lossy(commit.message_bytes());
        records.push(classify(&message).with_hash(oid.to_string()));
    }

    debug!(count = records.len(), "Classified commits");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_feat_commit() {
        let record = classify("feat: add new feature");
        assert_eq!(record.kind, ChangeType::Feat);
        assert_eq!(record.scope, None);
        assert_eq!(record.summary, "add new feature");
        assert!(!record.breaking);
    }

    #[test]
    fn test_classify_fix_with_scope() {
        let record = classify("fix(auth): resolve login bug");
        assert_eq!(record.kind, ChangeType::Fix);
        assert_eq!(record.scope.as_deref(), Some("auth"));
        assert_eq!(record.summary, "resolve login bug");
    }

    #[test]
    fn test_classify_breaking_with_exclamation() {
        let record = classify("feat!: breaking change");
        assert_eq!(record.kind, ChangeType::Feat);
        assert!(record.breaking);
    }

    #[test]
    fn test_classify_breaking_with_scope_and_exclamation() {
        let record = classify("feat(api)!: breaking api change");
        assert_eq!(record.scope.as_deref(), Some("api"));
        assert!(record.breaking);
    }

    #[test]
    fn test_classify_breaking_in_footer() {
        let record = classify("refactor: rework config\n\nBREAKING CHANGE: keys renamed");
        assert_eq!(record.kind, ChangeType::Refactor);
        assert!(record.breaking);
    }

    #[test]
    fn test_breaking_token_in_summary_is_not_a_footer() {
        let record = classify("docs: explain BREAKING CHANGE: footers");
        assert!(!record.breaking);
    }

    #[test]
    fn test_classify_non_conventional() {
        let record = classify("just a normal commit message");
        assert_eq!(record.kind, ChangeType::Other);
        assert_eq!(record.summary, "just a normal commit message");
        assert!(!record.breaking);
    }

    #[test]
    fn test_classify_unknown_type_is_other() {
        let record = classify("build(deps): bump serde");
        assert_eq!(record.kind, ChangeType::Other);
        assert_eq!(record.summary, "build(deps): bump serde");
    }

    #[test]
    fn test_classify_empty_summary_is_other() {
        let record = classify("feat: ");
        assert_eq!(record.kind, ChangeType::Other);
    }

    #[test]
    fn test_classify_empty_message() {
        let record = classify("");
        assert_eq!(record.kind, ChangeType::Other);
        assert_eq!(record.summary, "");
        assert!(!record.breaking);
    }

    #[test]
    fn test_short_hash() {
        let record = classify("fix: x").with_hash("0123456789abcdef");
        assert_eq!(record.short_hash(), Some("0123456"));
    }
}
