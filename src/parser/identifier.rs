//! Repository identifier normalization.
//!
//! Turns a caller-supplied identifier (a full repository URL or an
//! `owner/repo` shorthand) into the release-metadata URL and the canonical
//! `/owner/repo` path used for the tag fallback.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;
use url::Url;

/// GitHub REST API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const LATEST_RELEASE_SUFFIX: &str = "/releases/latest";

/// Shape check for absolute URLs, applied before handing the input to `Url`.
#[allow(clippy::expect_used)]
static ABSOLUTE_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?|ftp)://[^\s/$.?#].[^\s]*$").expect("absolute URL regex is valid") // Static pattern, safe to panic
});

/// A metadata lookup derived from one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRequest {
    /// URL of the "latest release" document.
    pub metadata_url: String,
    /// Canonical `/owner/repo` path (leading slash, no trailing slash).
    pub owner_repo_path: String,
}

impl NormalizedRequest {
    /// Splits the canonical path into `(owner, repo)`.
    ///
    /// Returns `None` when the path does not carry two non-empty segments.
    #[must_use]
    pub fn owner_repo(&self) -> Option<(&str, &str)> {
        let mut segments = self
            .owner_repo_path
            .split('/')
            .filter(|segment| !segment.is_empty());
        let owner = segments.next()?;
        let repo = segments.next()?;
        Some((owner, repo))
    }

    /// Builds the release-by-tag URL for this repository.
    #[must_use]
    pub fn tag_release_url(&self, api_base: &str, tag: &str) -> String {
        format!(
            "{}/repos{}/releases/tags/{}",
            api_base.trim_end_matches('/'),
            self.owner_repo_path,
            urlencoding::encode(tag)
        )
    }
}

/// Normalizes an identifier against the public GitHub API.
///
/// # Examples
///
/// ```
/// use getghrel_core::parser::normalize;
///
/// let request = normalize("https://github.com/sharkdp/bat");
/// assert_eq!(request.owner_repo_path, "/sharkdp/bat");
/// assert_eq!(
///     request.metadata_url,
///     "https://api.github.com/repos/sharkdp/bat/releases/latest"
/// );
/// ```
#[must_use]
pub fn normalize(identifier: &str) -> NormalizedRequest {
    normalize_with_api_base(identifier, DEFAULT_API_BASE)
}

/// Normalizes an identifier against an explicit API base URL.
///
/// Never fails: anything that is not a well-formed absolute URL is treated
/// as a literal `owner/repo` string.
#[must_use]
pub fn normalize_with_api_base(identifier: &str, api_base: &str) -> NormalizedRequest {
    let trimmed = identifier.trim();
    let raw_path = absolute_url_path(trimmed).unwrap_or_else(|| trimmed.to_string());
    let owner_repo_path = format!("/{}", raw_path.trim_matches('/'));
    let metadata_url = format!(
        "{}/repos{owner_repo_path}{LATEST_RELEASE_SUFFIX}",
        api_base.trim_end_matches('/')
    );
    trace!(identifier = %trimmed, %metadata_url, "normalized identifier");

    NormalizedRequest {
        metadata_url,
        owner_repo_path,
    }
}

/// Returns true when the identifier already points at a release asset download.
///
/// Such lines are what list mode prints, so download mode can consume them
/// without another metadata lookup.
#[must_use]
pub fn is_release_asset_url(identifier: &str) -> bool {
    Url::parse(identifier.trim()).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https") && url.path().contains("/releases/download/")
    })
}

fn absolute_url_path(input: &str) -> Option<String> {
    if !ABSOLUTE_URL_PATTERN.is_match(input) {
        return None;
    }
    let url = Url::parse(input).ok()?;
    url.host_str()?;
    let path = url.path();
    if path.trim_matches('/').is_empty() {
        return None;
    }
    Some(path.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_full_url() {
        let request = normalize("https://github.com/sharkdp/bat");
        assert_eq!(request.owner_repo_path, "/sharkdp/bat");
        assert_eq!(
            request.metadata_url,
            "https://api.github.com/repos/sharkdp/bat/releases/latest"
        );
    }

    #[test]
    fn test_normalize_owner_repo_shorthand() {
        let request = normalize("sharkdp/bat");
        assert_eq!(request.owner_repo_path, "/sharkdp/bat");
        assert_eq!(
            request.metadata_url,
            "https://api.github.com/repos/sharkdp/bat/releases/latest"
        );
    }

    #[test]
    fn test_normalize_shorthand_and_url_share_path() {
        assert_eq!(
            normalize("owner/repo").owner_repo_path,
            normalize("https://github.com/owner/repo").owner_repo_path
        );
    }

    #[test]
    fn test_normalize_trims_whitespace_and_trailing_slash() {
        let request = normalize("  https://github.com/owner/repo/  ");
        assert_eq!(request.owner_repo_path, "/owner/repo");
    }

    #[test]
    fn test_normalize_host_only_url_degrades_to_literal() {
        let request = normalize("https://github.com");
        assert_eq!(request.owner_repo_path, "/https://github.com");
    }

    #[test]
    fn test_normalize_unknown_scheme_is_literal() {
        let request = normalize("git://github.com/owner/repo");
        assert!(request.owner_repo_path.starts_with("/git:"));
    }

    #[test]
    fn test_normalize_custom_api_base() {
        let request = normalize_with_api_base("owner/repo", "http://127.0.0.1:9999/");
        assert_eq!(
            request.metadata_url,
            "http://127.0.0.1:9999/repos/owner/repo/releases/latest"
        );
    }

    #[test]
    fn test_owner_repo_split() {
        let request = normalize("https://github.com/sharkdp/bat");
        assert_eq!(request.owner_repo(), Some(("sharkdp", "bat")));
        assert_eq!(normalize("justowner").owner_repo(), None);
    }

    #[test]
    fn test_tag_release_url_encodes_tag() {
        let request = normalize("owner/repo");
        assert_eq!(
            request.tag_release_url("https://api.github.com", "v1.0+build"),
            "https://api.github.com/repos/owner/repo/releases/tags/v1.0%2Bbuild"
        );
    }

    #[test]
    fn test_is_release_asset_url() {
        assert!(is_release_asset_url(
            "https://github.com/sharkdp/bat/releases/download/v0.24.0/bat-v0.24.0-x86_64-unknown-linux-gnu.tar.gz"
        ));
        assert!(!is_release_asset_url("https://github.com/sharkdp/bat"));
        assert!(!is_release_asset_url("sharkdp/bat"));
    }
}
