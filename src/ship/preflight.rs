//! Preflight checks run before the release is written.
//!
//! Validates the branch, working tree state and tag namespace so the write
//! stage starts from a known-good repository.

use std::path::Path;

use git2::{Repository, Status, StatusOptions};
use tracing::debug;

use crate::error::{GitError, ReleaseError};
use crate::git::tag_exists;

/// The checked-out branch name, `None` for a detached HEAD.
pub fn current_branch(repo: &Repository) -> Result<Option<String>, GitError> {
    let head = repo
        .head()
        .map_err(|e| GitError::ReferenceNotFound("HEAD".to_string(), e))?;

    if !head.is_branch() {
        return Ok(None);
    }

    Ok(head.shorthand().map(String::from))
}

/// Whether tracked files are unmodified. Untracked and ignored files don't count.
pub fn is_clean(repo: &Repository) -> Result<bool, GitError> {
    let mut options = StatusOptions::new();
    options.include_untracked(false).include_ignored(false);

    let statuses = repo
        .statuses(Some(&mut options))
        .map_err(GitError::StatusFailed)?;

    let dirty: Vec<String> = statuses
        .iter()
        .filter(|entry| !entry.status().is_empty() && !entry.status().contains(Status::IGNORED))
        .filter_map(|entry| entry.path().map(String::from))
        .collect();

    if !dirty.is_empty() {
        debug!(files = ?dirty, "Uncommitted changes");
    }

    Ok(dirty.is_empty())
}

/// Whether a repository-relative path is excluded by `.gitignore`.
pub fn is_ignored(repo: &Repository, path: &Path) -> bool {
    repo.status_should_ignore(path).unwrap_or(false)
}

/// Run the checks that gate the write stage.
///
/// Checks (in order):
/// 1. Clean working tree
/// 2. Release tag does not exist yet
pub fn run_checks(repo: &Repository, tag_name: &str) -> Result<(), ReleaseError> {
    if !is_clean(repo).map_err(ReleaseError::History)? {
        return Err(ReleaseError::DirtyWorkingTree);
    }

    if tag_exists(repo, tag_name).map_err(ReleaseError::History)? {
        return Err(ReleaseError::TagAlreadyExists(tag_name.to_string()));
    }

    Ok(())
}
