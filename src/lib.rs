//! getghrel Core Library
//!
//! Resolves the latest GitHub release of each repository, picks the assets
//! built for one target platform, downloads and unpacks them, and keeps only
//! the files that are real executables for that platform.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`parser`] - Identifier cleanup and normalization to API URLs
//! - [`platform`] - Supported `(os, arch)` table and asset-name matching
//! - [`resolver`] - Release metadata lookup with tag fallback
//! - [`download`] - Authenticated streaming asset downloads
//! - [`extract`] - Archive dispatch and flattening extraction
//! - [`prune`] - Executable image verification and working-directory pruning
//! - [`pipeline`] - Concurrent producer/worker pipeline tying it together

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod extract;
pub mod parser;
pub mod pipeline;
pub mod platform;
pub mod prune;
pub mod resolver;
#[cfg(test)]
pub(crate) mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use download::{AssetDownloader, DownloadError, DownloadProgress, DownloadedAsset};
pub use extract::{ExtractError, ExtractOutcome};
pub use parser::{NormalizedRequest, normalize};
pub use pipeline::{
    Mode, OutputSink, Pipeline, PipelineConfig, PipelineError, RunReport, RunSummary,
};
pub use platform::{Arch, Os, Platform, PlatformError, PlatformPattern};
pub use prune::{ImageFormat, PruneError, PruneReport, Pruner};
pub use resolver::{GithubApi, GithubClient, MetadataResolver, ReleaseMetadata, ResolveError};
