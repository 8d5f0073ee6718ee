//! Write the release: manifests, changelog, commit, tag, push.
//!
//! Either every step lands or the repository is put back the way it was.

use std::path::{Path, PathBuf};

use git2::Repository;
use semver::Version;
use tracing::{debug, info, warn};

use crate::changelog::{has_version, prepend_section, read_changelog};
use crate::config::ReleaseConfig;
use crate::error::{ChangelogError, GitError, ManifestError, ReleaseError, WriteError};

use super::executor;
use super::manifest::{ManifestEntry, detect_manifests, read_file, render_manifest};
use super::preflight::is_ignored;
use super::transaction::FileTransaction;

/// What to write for one release.
#[derive(Debug, Clone)]
pub struct ReleasePlan<'a> {
    pub version: &'a Version,
    pub tag: &'a str,
    /// Rendered changelog section, heading included.
    pub section: &'a str,
    /// Branch to push to. Nothing is pushed without one.
    pub branch: Option<&'a str>,
}

/// The result of a successful write.
#[derive(Debug, Clone, Default)]
pub struct WrittenRelease {
    /// Files staged into the release commit, relative to the repository root.
    pub files: Vec<PathBuf>,
    pub changelog_written: bool,
    /// `false` when nothing changed and the tag points at the existing HEAD.
    pub commit_created: bool,
    pub pushed: bool,
}

#[derive(Debug, Default)]
struct Progress {
    staged: Vec<PathBuf>,
    committed: bool,
    tagged: bool,
}

/// Manifests to rewrite: the configured ones, or those detected in the root.
pub fn manifest_entries(
    workdir: &Path,
    config: &ReleaseConfig,
) -> Result<Vec<ManifestEntry>, ManifestError> {
    if !config.manifests.is_empty() {
        return Ok(config.manifests.clone());
    }
    let detected = detect_manifests(workdir)?;
    if detected.is_empty() {
        warn!("No version manifests configured or detected; only the changelog is updated");
    }
    Ok(detected)
}

/// Write the release and create its commit and tag.
///
/// On failure the tag is deleted, the commit reset, the index restored and
/// every touched file rewritten with its original contents.
pub fn write_release(
    repo: &Repository,
    config: &ReleaseConfig,
    plan: &ReleasePlan<'_>,
) -> Result<WrittenRelease, ReleaseError> {
    let workdir = repo
        .workdir()
        .ok_or(ReleaseError::History(GitError::BareRepository))?;

    let mut tx = FileTransaction::new();
    let mut progress = Progress::default();

    match apply(repo, workdir, config, plan, &mut tx, &mut progress) {
        Ok(written) => {
            tx.commit();
            Ok(written)
        }
        Err(source) => {
            warn!(error = %source, tag = plan.tag, "Release write failed, rolling back");
            let failures = rollback(workdir, plan.tag, &progress, tx);
            if failures.is_empty() {
                return Err(ReleaseError::Write {
                    version: plan.version.clone(),
                    source,
                });
            }
            Err(ReleaseError::RollbackIncomplete {
                version: plan.version.clone(),
                source,
                rollback: failures.join("; "),
                cleanup: cleanup_hint(plan.tag, &progress),
            })
        }
    }
}

fn apply(
    repo: &Repository,
    workdir: &Path,
    config: &ReleaseConfig,
    plan: &ReleasePlan<'_>,
    tx: &mut FileTransaction,
    progress: &mut Progress,
) -> Result<WrittenRelease, WriteError> {
    let mut written = WrittenRelease::default();

    // Manifests
    for entry in manifest_entries(workdir, config)? {
        let path = workdir.join(&entry.path);
        if !path.exists() {
            warn!(manifest = %entry.path.display(), "Manifest not found, skipping");
            continue;
        }

        let content = read_file(&path)?;
        let updated = render_manifest(&entry, &path, &content, plan.version)?;
        if updated == content {
            debug!(manifest = %entry.path.display(), "Manifest already at release version");
            continue;
        }

        tx.write(&path, updated.as_bytes())
            .map_err(|source| ManifestError::Write {
                path: path.clone(),
                source,
            })?;
        info!(manifest = %entry.path.display(), field = %entry.field, version = %plan.version, "Updated manifest");
        written.files.push(relative(workdir, &path));
    }

    // Changelog
    let changelog_path = workdir.join(&config.changelog);
    let existing = read_changelog(&changelog_path)?;
    if existing
        .as_deref()
        .is_some_and(|content| has_version(content, plan.version))
    {
        info!(version = %plan.version, "Changelog section already exists, skipping");
    } else {
        let content = prepend_section(existing.as_deref(), plan.section);
        tx.write(&changelog_path, content.as_bytes())
            .map_err(ChangelogError::WriteFailed)?;
        written.changelog_written = true;
        written.files.push(relative(workdir, &changelog_path));
    }

    // Extra assets such as lockfiles ride along when present
    for asset in &config.extra_assets {
        let rel = relative(workdir, &workdir.join(asset));
        if !workdir.join(&rel).exists() || is_ignored(repo, &rel) {
            debug!(asset = %asset.display(), "Extra asset missing or ignored, not staged");
            continue;
        }
        if !written.files.contains(&rel) {
            written.files.push(rel);
        }
    }

    executor::stage(workdir, &written.files)?;
    progress.staged = written.files.clone();

    if executor::has_staged_changes(workdir)? {
        let message = config.commit_message_for(plan.version, plan.tag);
        executor::commit(workdir, &message)?;
        progress.committed = true;
        written.commit_created = true;
        info!(message = %message, "Created release commit");
    } else {
        info!("No changes to commit; tagging current HEAD");
    }

    executor::create_tag(workdir, plan.tag)?;
    progress.tagged = true;
    info!(tag = plan.tag, "Created tag");

    if config.push {
        match plan.branch {
            Some(branch) => {
                executor::push(workdir, &config.remote, branch, plan.tag)?;
                written.pushed = true;
                info!(remote = %config.remote, branch, tag = plan.tag, "Pushed release");
            }
            None => warn!("No branch checked out, skipping push"),
        }
    }

    Ok(written)
}

/// Undo whatever `progress` records, newest step first. Returns failure descriptions.
fn rollback(
    workdir: &Path,
    tag: &str,
    progress: &Progress,
    tx: FileTransaction,
) -> Vec<String> {
    let mut failures = Vec::new();

    if progress.tagged
        && let Err(e) = executor::delete_tag(workdir, tag)
    {
        failures.push(format!("delete tag {}: {}", tag, e));
    }

    if progress.committed
        && let Err(e) = executor::reset_commit(workdir)
    {
        failures.push(format!("reset release commit: {}", e));
    }

    if let Err(e) = executor::unstage(workdir, &progress.staged) {
        failures.push(format!("unstage files: {}", e));
    }

    debug!(files = ?tx.touched(), "Restoring files");
    for path in tx.rollback() {
        failures.push(format!("restore {}", path.display()));
    }

    failures
}

fn cleanup_hint(tag: &str, progress: &Progress) -> String {
    let mut steps = Vec::new();
    if progress.tagged {
        steps.push(format!("git tag -d {}", tag));
    }
    if progress.committed {
        steps.push("git reset --soft HEAD~1".to_string());
    }
    steps.push("git reset -q".to_string());
    steps.push("git checkout -- .".to_string());
    steps.join(" && ")
}

fn relative(workdir: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(workdir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_hint_after_commit_and_tag() {
        let progress = Progress {
            staged: vec![PathBuf::from("Cargo.toml")],
            committed: true,
            tagged: true,
        };
        assert_eq!(
            cleanup_hint("v1.0.0", &progress),
            "git tag -d v1.0.0 && git reset --soft HEAD~1 && git reset -q && git checkout -- ."
        );
    }

    #[test]
    fn test_cleanup_hint_before_commit() {
        assert_eq!(
            cleanup_hint("v1.0.0", &Progress::default()),
            "git reset -q && git checkout -- ."
        );
    }

    #[test]
    fn test_relative_strips_workdir() {
        let root = Path::new("/repo");
        assert_eq!(relative(root, Path::new("/repo/CHANGELOG.md")), PathBuf::from("CHANGELOG.md"));
        assert_eq!(relative(root, Path::new("/elsewhere/x")), PathBuf::from("/elsewhere/x"));
    }

    #[test]
    fn test_manifest_entries_prefers_configured() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"x\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();

        let mut config = ReleaseConfig::default();
        assert_eq!(manifest_entries(dir.path(), &config).unwrap()[0].path, PathBuf::from("Cargo.toml"));

        config.manifests = vec![ManifestEntry::new("app/package.json", "version")];
        let entries = manifest_entries(dir.path(), &config).unwrap();
        assert_eq!(entries, vec![ManifestEntry::new("app/package.json", "version")]);
    }
}
