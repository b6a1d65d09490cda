//! Filename derivation, sanitization, and path resolution for downloads.
//!
//! Asset names come from release metadata or the last URL segment. Both are
//! untrusted, and so are entry names inside archives, so every name passes
//! through [`sanitize_filename`] before it touches the filesystem.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::extract::match_suffix;

const MAX_DUPLICATE_SUFFIX: usize = 1000;

/// Derives the asset file name from a download URL's last path segment,
/// percent-decoded.
#[must_use]
pub fn asset_file_name(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    Some(decoded)
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

/// Splits a file name into stem and extension.
///
/// A recognized archive suffix is kept whole (`tool` + `.tar.gz`); otherwise
/// the split is at the last dot.
fn split_name(filename: &str) -> (&str, &str) {
    if let Some(suffix) = match_suffix(filename) {
        let stem = suffix.strip(filename);
        return (stem, &filename[stem.len()..]);
    }
    match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename, ""),
    }
}

fn candidate_names(filename: &str) -> impl Iterator<Item = String> + '_ {
    let (stem, ext) = split_name(filename);
    std::iter::once(filename.to_string())
        .chain((1..MAX_DUPLICATE_SUFFIX).map(move |i| format!("{stem}_{i}{ext}")))
}

/// Resolves a unique file path, adding a numeric suffix if the file exists.
///
/// `tool` → `tool`, `tool_1`, `tool_2`, ...
pub(crate) fn resolve_unique_path(dir: &Path, filename: &str) -> PathBuf {
    let filename = sanitize_filename(filename);
    candidate_names(&filename)
        .map(|name| dir.join(name))
        .find(|path| !path.exists())
        .unwrap_or_else(|| dir.join(format!("{filename}_{MAX_DUPLICATE_SUFFIX}")))
}

/// Creates a new file under `dir`, renaming on collision.
///
/// Unlike [`resolve_unique_path`] the name is reserved atomically with
/// `create_new`, so concurrent writers into one directory never share a file.
///
/// # Errors
///
/// Returns the underlying I/O error for anything other than a name clash.
pub(crate) fn create_unique_file(dir: &Path, filename: &str) -> io::Result<(PathBuf, File)> {
    let filename = sanitize_filename(filename);
    for name in candidate_names(&filename) {
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name for {filename} in {}", dir.display()),
    ))
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
