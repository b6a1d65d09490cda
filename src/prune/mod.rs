//! Binary classification and pruning of the working directory.
//!
//! Runs once, after every worker has finished. Each regular file is parsed
//! as the target platform's executable image format; files that verify are
//! made executable and kept, everything else is deleted. File names are
//! never consulted.
//!
//! Files kept inside the staging area are moved up into the working
//! directory root, and staging directories left empty are removed.

mod image;

pub use image::{ImageError, ImageFormat, magic};

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::download::resolve_unique_path;

/// Name of the per-run staging directory inside the working directory.
pub const STAGING_DIR_NAME: &str = ".getghrel-staging";

/// Mode applied to every verified binary.
pub const EXECUTABLE_MODE: u32 = 0o755;

/// Errors that abort a pruning pass.
#[derive(Debug, Error)]
pub enum PruneError {
    /// The working directory itself could not be walked.
    #[error("cannot walk working directory {path}: {source}")]
    Walk {
        /// Working directory.
        path: PathBuf,
        /// Underlying walk error.
        #[source]
        source: walkdir::Error,
    },
}

impl PruneError {
    fn walk(path: &Path, source: walkdir::Error) -> Self {
        Self::Walk {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Outcome of a pruning pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    /// Final paths of verified binaries.
    pub kept: Vec<PathBuf>,
    /// Number of files deleted.
    pub removed: usize,
    /// Files that could not be read, deleted, or moved.
    pub failed: usize,
}

/// Classifies and prunes a working directory for one image format.
#[derive(Debug, Clone, Copy)]
pub struct Pruner {
    format: ImageFormat,
}

impl Pruner {
    /// Creates a pruner that keeps images of `format`.
    #[must_use]
    pub fn new(format: ImageFormat) -> Self {
        Self { format }
    }

    /// Image format this pruner keeps.
    #[must_use]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Prunes `working_dir`.
    ///
    /// Per-file failures are logged and counted in the report; only a
    /// failure to walk the root aborts the pass.
    ///
    /// # Errors
    ///
    /// Returns [`PruneError::Walk`] if `working_dir` cannot be read.
    #[instrument(skip(self), fields(format = self.format.as_str()))]
    pub fn prune(&self, working_dir: &Path) -> Result<PruneReport, PruneError> {
        let mut report = PruneReport::default();
        let staging_root = working_dir.join(STAGING_DIR_NAME);

        // Collect first so renames and deletions don't disturb the walk.
        let mut files = Vec::new();
        for entry in WalkDir::new(working_dir).min_depth(1) {
            match entry {
                Ok(entry) if entry.file_type().is_dir() => {}
                Ok(entry) => files.push(entry),
                Err(e) if e.depth() == 0 => return Err(PruneError::walk(working_dir, e)),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    report.failed += 1;
                }
            }
        }

        // Root files first, so a staged binary replaces a stale one of the
        // same name instead of being renamed around it.
        files.sort_by_key(|entry| entry.path().starts_with(&staging_root));
        let mut claimed = HashSet::new();

        for entry in files {
            let path = entry.path();
            if !entry.file_type().is_file() {
                debug!(path = %path.display(), "removing non-regular file");
                self.remove(path, &mut report);
                continue;
            }

            match self.format.verify_path(path) {
                Ok(()) => match keep(path, working_dir, &staging_root, &mut claimed) {
                    Ok(kept) => {
                        debug!(path = %kept.display(), "verified binary");
                        report.kept.push(kept);
                    }
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "failed to keep verified binary"
                        );
                        report.failed += 1;
                    }
                },
                Err(e) if e.is_io() => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "cannot read file, leaving it in place"
                    );
                    report.failed += 1;
                }
                Err(e) => {
                    debug!(path = %path.display(), reason = %e, "not a native binary");
                    self.remove(path, &mut report);
                }
            }
        }

        remove_empty_dirs(&staging_root);

        report.kept.sort();
        report.kept.dedup();
        info!(
            kept = report.kept.len(),
            removed = report.removed,
            failed = report.failed,
            "pruning complete"
        );
        Ok(report)
    }

    #[allow(clippy::unused_self)]
    fn remove(&self, path: &Path, report: &mut PruneReport) {
        match fs::remove_file(path) {
            Ok(()) => report.removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => report.removed += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to delete file");
                report.failed += 1;
            }
        }
    }
}

/// Marks a verified file executable and moves it out of the staging area.
///
/// A staged file replaces a root file left by an earlier run. Only names
/// already `claimed` by this pass get a numeric suffix.
fn keep(
    path: &Path,
    working_dir: &Path,
    staging_root: &Path,
    claimed: &mut HashSet<PathBuf>,
) -> io::Result<PathBuf> {
    set_executable(path)?;

    if !path.starts_with(staging_root) {
        return Ok(path.to_path_buf());
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut target = working_dir.join(&name);
    if claimed.contains(&target) {
        target = resolve_unique_path(working_dir, &name);
    } else if target.is_file() {
        debug!(path = %target.display(), "replacing binary from an earlier run");
    }
    fs::rename(path, &target)?;
    claimed.insert(target.clone());
    Ok(target)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(EXECUTABLE_MODE))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Removes `root` and every directory below it that is left empty.
fn remove_empty_dirs(root: &Path) {
    if !root.is_dir() {
        return;
    }
    for entry in WalkDir::new(root)
        .contents_first(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
    {
        // Non-empty directories fail here and stay.
        if fs::remove_dir(entry.path()).is_ok() {
            debug!(path = %entry.path().display(), "removed empty staging directory");
        }
    }
}
