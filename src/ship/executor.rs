//! Git operations for the release commit: stage, commit, tag, push, and rollback.
//!
//! All operations shell out to the system `git` binary inside the repository
//! working directory, inheriting the user's git config, hooks, SSH agent, and
//! credential store.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::debug;

use crate::error::GitError;

/// Stage files for the release commit.
pub fn stage(workdir: &Path, files: &[PathBuf]) -> Result<(), GitError> {
    if files.is_empty() {
        return Ok(());
    }
    let mut args: Vec<&str> = vec!["add", "--"];
    args.extend(files.iter().filter_map(|p| p.to_str()));
    run_git(workdir, &args, "stage files")
}

/// Whether the index differs from HEAD.
pub fn has_staged_changes(workdir: &Path) -> Result<bool, GitError> {
    let output = git_output(workdir, &["diff", "--cached", "--quiet"], "diff index")?;
    match output.status.code() {
        Some(0) => Ok(false),
        Some(1) => Ok(true),
        _ => Err(command_failed("diff index", &output)),
    }
}

/// Create the release commit from the index.
pub fn commit(workdir: &Path, message: &str) -> Result<(), GitError> {
    run_git(workdir, &["commit", "-m", message], "create commit")
}

/// Create an annotated tag at HEAD.
pub fn create_tag(workdir: &Path, tag_name: &str) -> Result<(), GitError> {
    let tag_message = format!("Release {}", tag_name);
    run_git(
        workdir,
        &["tag", "-a", tag_name, "-m", &tag_message],
        "create tag",
    )
}

/// Push the branch and the tag in one atomic push.
pub fn push(workdir: &Path, remote: &str, branch: &str, tag_name: &str) -> Result<(), GitError> {
    let branch_ref = format!("HEAD:refs/heads/{}", branch);
    let tag_ref = format!("refs/tags/{}", tag_name);
    run_git(
        workdir,
        &["push", "--atomic", remote, &branch_ref, &tag_ref],
        "push",
    )
}

/// Delete a local tag.
pub fn delete_tag(workdir: &Path, tag_name: &str) -> Result<(), GitError> {
    run_git(workdir, &["tag", "-d", tag_name], "delete tag")
}

/// Undo the release commit, keeping its changes staged.
pub fn reset_commit(workdir: &Path) -> Result<(), GitError> {
    run_git(workdir, &["reset", "--soft", "HEAD~1"], "reset commit")
}

/// Remove files from the index without touching the working tree.
pub fn unstage(workdir: &Path, files: &[PathBuf]) -> Result<(), GitError> {
    if files.is_empty() {
        return Ok(());
    }
    let mut args: Vec<&str> = vec!["reset", "-q", "--"];
    args.extend(files.iter().filter_map(|p| p.to_str()));
    run_git(workdir, &args, "unstage files")
}

/// Run a git command and return success or a descriptive error.
fn run_git(workdir: &Path, args: &[&str], operation: &str) -> Result<(), GitError> {
    let output = git_output(workdir, args, operation)?;
    if !output.status.success() {
        return Err(command_failed(operation, &output));
    }
    Ok(())
}

fn git_output(workdir: &Path, args: &[&str], operation: &str) -> Result<Output, GitError> {
    debug!(?args, "git");
    Command::new("git")
        .args(args)
        .current_dir(workdir)
        .output()
        .map_err(|source| GitError::SpawnFailed {
            operation: operation.to_string(),
            source,
        })
}

fn command_failed(operation: &str, output: &Output) -> GitError {
    GitError::CommandFailed {
        operation: operation.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}
