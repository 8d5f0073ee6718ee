//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use git2::{Oid, Repository, RepositoryInitOptions, Signature};

use herald::PublishError;
use herald::ship::publish::{ReleaseHost, RemoteRelease};

/// A test git repository builder for integration tests.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
}

impl TestRepo {
    /// Create a new empty git repository on `main` in a temp directory.
    ///
    /// Identity is set in the repository config so the `git` binary can
    /// commit and tag without a global config.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(dir.path(), &opts).expect("Failed to init git repo");

        let mut config = repo.config().expect("Failed to open repo config");
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
        config.set_bool("commit.gpgsign", false).unwrap();
        config.set_bool("tag.gpgsign", false).unwrap();

        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Open a second handle, as the orchestrator takes ownership of one.
    pub fn open(&self) -> Repository {
        Repository::open(self.path()).expect("Failed to reopen repo")
    }

    /// Get the test signature for commits.
    fn signature(&self) -> Signature<'_> {
        Signature::now("Test User", "test@example.com").expect("Failed to create signature")
    }

    /// Write a file relative to the repository root.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.path().join(name)).expect("Failed to read file")
    }

    /// Write `name` and commit it with `message`. Returns the commit OID.
    pub fn commit_file(&self, name: &str, content: &str, message: &str) -> Oid {
        self.write(name, content);

        let mut index = self.repo.index().expect("Failed to get index");
        // Pick up index changes made by the git binary
        index.read(true).expect("Failed to reload index");
        index.add_path(Path::new(name)).expect("Failed to add file");
        index.write().expect("Failed to write index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");

        let sig = self.signature();
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }

    /// Create a commit touching a scratch file.
    pub fn commit(&self, message: &str) -> Oid {
        let content = format!(
            "{}\n{}",
            message,
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        );
        self.commit_file("test.txt", &content, message)
    }

    /// Commit on top of `parent` without moving HEAD, as on a side branch.
    pub fn commit_off(&self, parent: Oid, message: &str) -> Oid {
        let parent = self.repo.find_commit(parent).expect("Failed to find parent");
        let tree = parent.tree().expect("Failed to read parent tree");
        let sig = self.signature();
        self.repo
            .commit(None, &sig, &sig, message, &tree, &[&parent])
            .expect("Failed to create side commit")
    }

    /// Merge `other` into the current branch with a merge commit, keeping HEAD's tree.
    pub fn merge_commit(&self, other: Oid, message: &str) -> Oid {
        let head = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .expect("Failed to read HEAD");
        let other = self.repo.find_commit(other).expect("Failed to find merged commit");
        let tree = head.tree().expect("Failed to read HEAD tree");
        let sig = self.signature();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&head, &other])
            .expect("Failed to create merge commit")
    }

    /// Resolve a revision such as a tag name to its commit.
    pub fn rev(&self, spec: &str) -> Oid {
        self.repo
            .revparse_single(spec)
            .and_then(|obj| obj.peel_to_commit())
            .map(|commit| commit.id())
            .expect("Failed to resolve revision")
    }

    /// Create a lightweight tag pointing to the given OID.
    pub fn tag_lightweight(&self, name: &str, oid: Oid) {
        let obj = self.repo.find_object(oid, None).expect("Failed to find object");
        self.repo
            .tag_lightweight(name, &obj, false)
            .expect("Failed to create lightweight tag");
    }

    /// Create an annotated tag pointing to the given OID.
    pub fn tag_annotated(&self, name: &str, oid: Oid, message: &str) {
        let sig = self.signature();
        let obj = self.repo.find_object(oid, None).expect("Failed to find object");
        self.repo
            .tag(name, &obj, &sig, message, false)
            .expect("Failed to create annotated tag");
    }

    pub fn tag_exists(&self, name: &str) -> bool {
        self.open()
            .find_reference(&format!("refs/tags/{}", name))
            .is_ok()
    }

    /// Message of the commit at HEAD.
    pub fn head_message(&self) -> String {
        self.open()
            .head()
            .and_then(|h| h.peel_to_commit())
            .map(|c| c.message().unwrap_or_default().to_string())
            .expect("Failed to read HEAD")
    }

    /// A released 0.3.2 Cargo project followed by one fix and one feature.
    pub fn released_project() -> Self {
        let repo = Self::new();
        let base = repo.commit_file(
            "Cargo.toml",
            "[package]\nname = \"app\"\nversion = \"0.3.2\"\nedition = \"2024\"\n",
            "chore: initial import",
        );
        repo.tag_annotated("v0.3.2", base, "Release v0.3.2");
        repo.commit("fix: x");
        repo.commit("feat: y");
        repo
    }
}

/// In-memory release host.
#[derive(Default)]
pub struct FakeHost {
    releases: Mutex<Vec<(RemoteRelease, String)>>,
    uploads: Mutex<Vec<String>>,
    fail_uploads: AtomicBool,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_uploads() -> Self {
        let host = Self::default();
        host.set_failing(true);
        host
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_uploads.store(failing, Ordering::SeqCst);
    }

    pub fn uploads(&self) -> Vec<String> {
        let mut uploads = self.uploads.lock().unwrap().clone();
        uploads.sort();
        uploads
    }

    pub fn release_count(&self) -> usize {
        self.releases.lock().unwrap().len()
    }

    pub fn release_body(&self, tag: &str) -> Option<String> {
        self.releases
            .lock()
            .unwrap()
            .iter()
            .find(|(r, _)| r.tag == tag)
            .map(|(_, body)| body.clone())
    }
}

#[async_trait]
impl ReleaseHost for FakeHost {
    async fn find_release(&self, tag: &str) -> Result<Option<RemoteRelease>, PublishError> {
        let uploads = self.uploads.lock().unwrap().clone();
        Ok(self
            .releases
            .lock()
            .unwrap()
            .iter()
            .find(|(r, _)| r.tag == tag)
            .map(|(r, _)| RemoteRelease {
                assets: uploads,
                ..r.clone()
            }))
    }

    async fn create_release(
        &self,
        tag: &str,
        _name: &str,
        body: &str,
    ) -> Result<RemoteRelease, PublishError> {
        let mut releases = self.releases.lock().unwrap();
        let release = RemoteRelease {
            id: releases.len() as u64 + 1,
            tag: tag.to_string(),
            html_url: Some(format!("https://github.com/owner/repo/releases/tag/{}", tag)),
            assets: Vec::new(),
        };
        releases.push((release.clone(), body.to_string()));
        Ok(release)
    }

    async fn upload_asset(
        &self,
        _release_id: u64,
        name: &str,
        _data: Vec<u8>,
    ) -> Result<(), PublishError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(PublishError::Transport("502 Bad Gateway".to_string()));
        }
        self.uploads.lock().unwrap().push(name.to_string());
        Ok(())
    }
}
