//! Release document model.

use serde::Deserialize;

use crate::download::asset_file_name;

/// API message returned when a repository has no formal release.
pub const NOT_FOUND_MESSAGE: &str = "Not Found";

/// The subset of a GitHub release document the tool uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReleaseMetadata {
    /// Error message, present on "Not Found" and similar documents.
    #[serde(default)]
    pub message: Option<String>,
    /// Release tag, when the document describes a release.
    #[serde(default)]
    pub tag_name: Option<String>,
    /// Downloadable assets.
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// One release asset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Asset {
    /// Public download URL.
    pub browser_download_url: String,
    /// File name as published.
    #[serde(default)]
    pub name: Option<String>,
}

impl ReleaseMetadata {
    /// True for the "Not Found" document that triggers the tag fallback.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.message.as_deref() == Some(NOT_FOUND_MESSAGE)
    }
}

impl Asset {
    /// File name used for matching: the published name, else the last URL
    /// segment.
    #[must_use]
    pub fn file_name(&self) -> Option<String> {
        self.name
            .clone()
            .filter(|name| !name.is_empty())
            .or_else(|| asset_file_name(&self.browser_download_url))
    }
}
