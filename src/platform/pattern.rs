//! Asset file-name matching for one platform.

use regex::Regex;
use tracing::trace;

use super::{Platform, PlatformError};

/// Suffixes of release artifacts that are never binaries: checksums,
/// signatures, SBOMs and manifests, and OS package formats.
const AUXILIARY_SUFFIX_PATTERN: &str = r"(?i)(?:\.(?:sha(?:1|224|256|384|512)?(?:sums?)?|md5(?:sums?)?|sig|asc|pem|minisig|sbom|spdx|cdx|json|jsonl|txt|ya?ml|deb|rpm|apk|msi|pkg|dmg)|checksums?)$";

/// Compiled matching rule for asset names of one platform.
///
/// A name matches when it carries an OS keyword and an architecture keyword
/// (either order, anything in between) with the pair followed by a
/// non-letter or the end of the name, carries no keyword of another OS, and
/// does not end in an auxiliary-artifact suffix.
#[derive(Debug, Clone)]
pub struct PlatformPattern {
    platform: Platform,
    pair: Regex,
    foreign: Regex,
    auxiliary: Regex,
}

impl PlatformPattern {
    /// Compiles the pattern for `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Pattern`] if a pattern fails to compile.
    pub fn new(platform: Platform) -> Result<Self, PlatformError> {
        let os = alternation(platform.os.keywords());
        let arch = alternation(platform.arch.keywords());
        let pair = Regex::new(&format!(
            r"(?i)(?:(?:{os}).*(?:{arch})|(?:{arch}).*(?:{os}))(?:[^a-z]|$)"
        ))?;
        let foreign = Regex::new(&format!(
            "(?i){}",
            alternation(&platform.os.foreign_keywords())
        ))?;
        let auxiliary = Regex::new(AUXILIARY_SUFFIX_PATTERN)?;

        Ok(Self {
            platform,
            pair,
            foreign,
            auxiliary,
        })
    }

    /// The platform this pattern selects for.
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Returns true when `file_name` is an asset for this platform.
    #[must_use]
    pub fn matches(&self, file_name: &str) -> bool {
        let matched = !self.foreign.is_match(file_name)
            && !self.auxiliary.is_match(file_name)
            && self.pair.is_match(file_name);
        trace!(file_name, matched, platform = %self.platform, "matched asset name");
        matched
    }
}

fn alternation(keywords: &[&str]) -> String {
    keywords
        .iter()
        .map(|keyword| regex::escape(keyword))
        .collect::<Vec<_>>()
        .join("|")
}
