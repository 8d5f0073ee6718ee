//! Release pipeline: go from commit history to a published release.
//!
//! The orchestrator walks a fixed state machine:
//!
//! ```text
//! Idle → Classifying → Resolving → (NoOp | Writing → Publishing → Done) | Failed
//! ```
//!
//! Everything before `Writing` is read-only. `Writing` is all-or-nothing.
//! Once the tag exists a failure is reported as recoverable with `resume`.

pub mod executor;
pub mod manifest;
pub mod preflight;
pub mod publish;
pub mod transaction;
pub mod writer;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use git2::{Oid, Repository};
use semver::Version;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::changelog::{ReleaseNotes, extract_notes, format_version_section, read_changelog};
use crate::config::ReleaseConfig;
use crate::error::{ChangelogError, GitError, PublishError, ReleaseError};
use crate::git::{
    ChangeRecord, TagInfo, fetch_records, get_latest_reachable_tag, highest_release,
    reachable_release_tags,
};
use crate::version::{VersionDecision, resolve};

use self::preflight::{current_branch, run_checks};
use self::publish::{PublishReport, ReleaseHost, publish_release};
use self::writer::{ReleasePlan, WrittenRelease, write_release};

/// Where a release run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStage {
    Idle,
    Classifying,
    Resolving,
    NoOp,
    Writing,
    Publishing,
    Done,
    Failed,
}

impl fmt::Display for ReleaseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReleaseStage::Idle => "idle",
            ReleaseStage::Classifying => "classifying",
            ReleaseStage::Resolving => "resolving",
            ReleaseStage::NoOp => "no-op",
            ReleaseStage::Writing => "writing",
            ReleaseStage::Publishing => "publishing",
            ReleaseStage::Done => "done",
            ReleaseStage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Why a run ended without releasing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoOpReason {
    /// No feat, fix, perf or breaking commits since the last release.
    NoReleasableChanges,
    NotReleaseBranch(String),
    DetachedHead,
}

impl fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoOpReason::NoReleasableChanges => {
                write!(f, "no releasable changes since the last release")
            }
            NoOpReason::NotReleaseBranch(branch) => {
                write!(f, "branch '{}' is not a release branch", branch)
            }
            NoOpReason::DetachedHead => write!(f, "HEAD is detached"),
        }
    }
}

/// Commit history since the last release.
#[derive(Debug, Clone)]
pub struct History {
    pub latest_tag: Option<TagInfo>,
    /// Newest first.
    pub records: Vec<ChangeRecord>,
}

/// Everything decided and done for one release.
#[derive(Debug, Clone)]
pub struct ReleaseSummary {
    pub decision: VersionDecision,
    pub tag: String,
    pub notes: ReleaseNotes,
    /// The changelog section, heading included.
    pub section: String,
    pub commit_count: usize,
    /// `None` on a dry run.
    pub written: Option<WrittenRelease>,
    /// `None` when no release host is configured.
    pub published: Option<PublishReport>,
}

/// How a run ended successfully.
#[derive(Debug, Clone)]
pub enum ReleaseOutcome {
    NoOp {
        reason: NoOpReason,
        decision: VersionDecision,
    },
    /// A release was decided but nothing was written.
    DryRun(ReleaseSummary),
    Released(ReleaseSummary),
    /// Publishing was retried for an existing tag.
    Resumed {
        tag: String,
        version: Version,
        report: PublishReport,
    },
}

/// Drives one release run against a repository.
pub struct Orchestrator {
    repo: Repository,
    config: ReleaseConfig,
    host: Option<Arc<dyn ReleaseHost>>,
    dry_run: bool,
    build_dir: PathBuf,
    stage: ReleaseStage,
    transitions: Vec<ReleaseStage>,
}

impl Orchestrator {
    pub fn new(repo: Repository, config: ReleaseConfig) -> Self {
        let build_dir = config.build_dir.clone();
        Self {
            repo,
            config,
            host: None,
            dry_run: false,
            build_dir,
            stage: ReleaseStage::Idle,
            transitions: vec![ReleaseStage::Idle],
        }
    }

    /// Open the repository at `path`.
    pub fn open(path: &Path, config: ReleaseConfig) -> Result<Self, GitError> {
        let repo = Repository::open(path).map_err(GitError::OpenRepository)?;
        Ok(Self::new(repo, config))
    }

    /// Publish releases to `host`. Without one, runs stop after writing.
    pub fn with_host(mut self, host: Arc<dyn ReleaseHost>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Override the configured build directory.
    pub fn build_dir(mut self, build_dir: impl Into<PathBuf>) -> Self {
        self.build_dir = build_dir.into();
        self
    }

    pub fn stage(&self) -> ReleaseStage {
        self.stage
    }

    /// Every stage entered so far, starting with `Idle`.
    pub fn transitions(&self) -> &[ReleaseStage] {
        &self.transitions
    }

    pub fn config(&self) -> &ReleaseConfig {
        &self.config
    }

    /// Classify every commit since the latest release tag reachable from HEAD.
    pub fn history(&self) -> Result<History, GitError> {
        let released = reachable_release_tags(&self.repo, &self.config.tag_format)?;
        let boundaries: Vec<Oid> = released.iter().map(|t| t.oid).collect();
        let records = fetch_records(&self.repo, &boundaries)?;
        Ok(History {
            latest_tag: highest_release(&released).cloned(),
            records,
        })
    }

    /// Cut a release.
    pub async fn run(&mut self) -> Result<ReleaseOutcome, ReleaseError> {
        let result = self.run_stages().await;
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }

    /// Retry publishing for the latest release tag, skipping everything else.
    pub async fn resume(&mut self) -> Result<ReleaseOutcome, ReleaseError> {
        let result = self.resume_publish().await;
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }

    async fn run_stages(&mut self) -> Result<ReleaseOutcome, ReleaseError> {
        self.transition(ReleaseStage::Classifying);
        let history = self.history().map_err(ReleaseError::History)?;
        info!(
            since = history.latest_tag.as_ref().map(|t| t.name.as_str()).unwrap_or("(initial)"),
            commits = history.records.len(),
            "Classified commits"
        );

        self.transition(ReleaseStage::Resolving);
        let previous = history.latest_tag.as_ref().and_then(|t| t.version.as_ref());
        let decision = resolve(previous, &history.records);
        info!(
            previous = %decision.previous,
            next = %decision.next,
            bump = %decision.bump,
            "Resolved version"
        );

        let branch = current_branch(&self.repo).map_err(ReleaseError::History)?;
        let reason = match &branch {
            None => Some(NoOpReason::DetachedHead),
            Some(name) if !self.config.is_release_branch(name) => {
                Some(NoOpReason::NotReleaseBranch(name.clone()))
            }
            Some(_) if !decision.is_release() => Some(NoOpReason::NoReleasableChanges),
            Some(_) => None,
        };
        if let Some(reason) = reason {
            self.transition(ReleaseStage::NoOp);
            info!(%reason, "Nothing to release");
            return Ok(ReleaseOutcome::NoOp { reason, decision });
        }

        let tag = self.config.tag_format.tag_name(&decision.next);
        let notes = ReleaseNotes::build(&history.records, &self.config.sections);
        let date = Utc::now().format("%Y-%m-%d").to_string();
        let section = format_version_section(&decision.next, &date, &notes);

        let mut summary = ReleaseSummary {
            decision,
            tag,
            notes,
            section,
            commit_count: history.records.len(),
            written: None,
            published: None,
        };

        if self.dry_run {
            info!(tag = %summary.tag, "Dry run, nothing written");
            return Ok(ReleaseOutcome::DryRun(summary));
        }

        self.transition(ReleaseStage::Writing);
        run_checks(&self.repo, &summary.tag)?;
        let plan = ReleasePlan {
            version: &summary.decision.next,
            tag: &summary.tag,
            section: &summary.section,
            branch: branch.as_deref(),
        };
        summary.written = Some(write_release(&self.repo, &self.config, &plan)?);

        self.transition(ReleaseStage::Publishing);
        let body = summary.notes.render();
        summary.published = self
            .publish(&summary.decision.next, &summary.tag, body.trim())
            .await?;

        self.transition(ReleaseStage::Done);
        info!(tag = %summary.tag, "Release complete");
        Ok(ReleaseOutcome::Released(summary))
    }

    async fn resume_publish(&mut self) -> Result<ReleaseOutcome, ReleaseError> {
        self.transition(ReleaseStage::Publishing);

        let latest = get_latest_reachable_tag(&self.repo, &self.config.tag_format)
            .map_err(ReleaseError::History)?
            .ok_or(ReleaseError::NothingToResume)?;
        let version = latest.version.clone().ok_or(ReleaseError::NothingToResume)?;
        let tag = latest.name;
        info!(tag = %tag, "Resuming publish");

        let notes = self.recover_notes(&tag, &version)?;
        let host = self.host.clone().ok_or_else(|| ReleaseError::Publish {
            version: version.clone(),
            tag: tag.clone(),
            source: PublishError::NoReleaseHost,
        })?;

        let report = publish_release(host, &tag, &notes, &self.resolved_build_dir(), &self.config.artifacts)
            .await
            .map_err(|source| ReleaseError::Publish {
                version: version.clone(),
                tag: tag.clone(),
                source,
            })?;

        self.transition(ReleaseStage::Done);
        Ok(ReleaseOutcome::Resumed {
            tag,
            version,
            report,
        })
    }

    /// Read the notes for `version` back out of the committed changelog.
    fn recover_notes(&self, tag: &str, version: &Version) -> Result<String, ReleaseError> {
        let to_error = |source: ChangelogError| ReleaseError::ResumeNotes {
            tag: tag.to_string(),
            source,
        };

        let workdir = self
            .repo
            .workdir()
            .ok_or(ReleaseError::History(GitError::BareRepository))?;
        let content = read_changelog(&workdir.join(&self.config.changelog))
            .map_err(to_error)?
            .ok_or_else(|| to_error(ChangelogError::VersionNotFound(version.to_string())))?;

        extract_notes(&content, version).map_err(to_error)
    }

    async fn publish(
        &self,
        version: &Version,
        tag: &str,
        body: &str,
    ) -> Result<Option<PublishReport>, ReleaseError> {
        let Some(host) = &self.host else {
            if !self.config.artifacts.is_empty() {
                warn!("No release host configured, artifacts were not uploaded");
            }
            return Ok(None);
        };

        publish_release(
            Arc::clone(host),
            tag,
            body,
            &self.resolved_build_dir(),
            &self.config.artifacts,
        )
        .await
        .map(Some)
        .map_err(|source| ReleaseError::Publish {
            version: version.clone(),
            tag: tag.to_string(),
            source,
        })
    }

    /// The build directory, relative paths taken from the repository root.
    fn resolved_build_dir(&self) -> PathBuf {
        match self.repo.workdir() {
            Some(workdir) => workdir.join(&self.build_dir),
            None => self.build_dir.clone(),
        }
    }

    fn transition(&mut self, next: ReleaseStage) {
        info!(from = %self.stage, to = %next, "Release stage");
        self.stage = next;
        self.transitions.push(next);
    }

    fn fail(&mut self, e: &ReleaseError) {
        error!(stage = %e.stage(), tag_created = e.tag_created(), error = %e, "Release failed");
        self.stage = ReleaseStage::Failed;
        self.transitions.push(ReleaseStage::Failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(ReleaseStage::NoOp.to_string(), "no-op");
        assert_eq!(ReleaseStage::Publishing.to_string(), "publishing");
    }

    #[test]
    fn test_noop_reason_display() {
        assert_eq!(
            NoOpReason::NotReleaseBranch("feature/x".to_string()).to_string(),
            "branch 'feature/x' is not a release branch"
        );
    }

    #[test]
    fn test_error_stage_and_exit_code() {
        let before_tag = ReleaseError::TagAlreadyExists("v1.0.0".to_string());
        assert_eq!(before_tag.stage(), ReleaseStage::Writing);
        assert_eq!(before_tag.exit_code(), 1);

        let after_tag = ReleaseError::Publish {
            version: Version::new(1, 0, 0),
            tag: "v1.0.0".to_string(),
            source: PublishError::Transport("timeout".to_string()),
        };
        assert_eq!(after_tag.stage(), ReleaseStage::Publishing);
        assert!(after_tag.tag_created());
        assert_eq!(after_tag.exit_code(), 2);
        assert!(after_tag.to_string().contains("bumped and tagged"));
    }
}
