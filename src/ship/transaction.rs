//! All-or-nothing file writes for the release commit.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Tracks every file written during a release so it can be put back.
///
/// Each path is snapshotted the first time it is written. `rollback` restores
/// the snapshots in reverse order and deletes files that did not exist before.
#[derive(Debug, Default)]
pub struct FileTransaction {
    snapshots: Vec<(PathBuf, Option<Vec<u8>>)>,
}

impl FileTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `content` to `path`, snapshotting the previous contents first.
    pub fn write(&mut self, path: &Path, content: &[u8]) -> std::io::Result<()> {
        if !self.snapshots.iter().any(|(p, _)| p == path) {
            let previous = match fs::read(path) {
                Ok(bytes) => Some(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(e),
            };
            self.snapshots.push((path.to_path_buf(), previous));
        }

        write_atomic(path, content)
    }

    /// Paths written so far, in write order.
    pub fn touched(&self) -> Vec<PathBuf> {
        self.snapshots.iter().map(|(p, _)| p.clone()).collect()
    }

    /// Restore every snapshot. Returns the paths that could not be restored.
    pub fn rollback(self) -> Vec<PathBuf> {
        let mut failed = Vec::new();

        for (path, previous) in self.snapshots.into_iter().rev() {
            let result = match &previous {
                Some(bytes) => write_atomic(&path, bytes),
                None => match fs::remove_file(&path) {
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    other => other,
                },
            };

            match result {
                Ok(()) => debug!(path = %path.display(), "Restored file"),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to restore file");
                    failed.push(path);
                }
            }
        }

        failed
    }

    /// Keep the writes and drop the snapshots.
    pub fn commit(self) {
        debug!(files = self.snapshots.len(), "File transaction committed");
    }
}

/// Replace `path` with `content` via a temporary file in the same directory.
///
/// Existing file permissions are carried over to the new file.
pub fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), metadata.permissions())?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
