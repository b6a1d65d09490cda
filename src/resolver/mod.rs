//! Release metadata resolution.
//!
//! # Architecture
//!
//! - [`GithubApi`] - Async transport seam: authenticated GET and latest tag
//! - [`GithubClient`] - `reqwest` implementation of the seam
//! - [`MetadataResolver`] - Latest release lookup with a single tag fallback
//! - [`ReleaseMetadata`] - The parsed release document
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use getghrel_core::parser::normalize;
//! use getghrel_core::resolver::{GithubClient, MetadataResolver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = Arc::new(GithubClient::new("ghp_example")?);
//! let resolver = MetadataResolver::new(api);
//!
//! let release = resolver.resolve(&normalize("sharkdp/bat")).await?;
//! for asset in &release.assets {
//!     println!("{}", asset.browser_download_url);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod github;
mod http_client;
mod release;

pub use error::ResolveError;
pub use github::{DEFAULT_METADATA_TIMEOUT, GithubApi, GithubClient};
pub use http_client::build_http_client;
pub use release::{Asset, NOT_FOUND_MESSAGE, ReleaseMetadata};

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::parser::NormalizedRequest;

/// Resolves the most recent eligible release for a repository.
#[derive(Clone)]
pub struct MetadataResolver {
    api: Arc<dyn GithubApi>,
}

impl MetadataResolver {
    /// Creates a resolver over an API transport.
    #[must_use]
    pub fn new(api: Arc<dyn GithubApi>) -> Self {
        Self { api }
    }

    /// Fetches the latest release document, falling back to the release of
    /// the most recent tag when the repository has no formal release.
    ///
    /// The fallback runs at most once. A repository without tags yields a
    /// document with no assets.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] for transport, status, authentication, or
    /// parse failures.
    #[instrument(skip(self, request), fields(repo = %request.owner_repo_path))]
    pub async fn resolve(
        &self,
        request: &NormalizedRequest,
    ) -> Result<ReleaseMetadata, ResolveError> {
        let latest = self.fetch_document(&request.metadata_url).await?;
        if !latest.is_not_found() {
            return Ok(latest);
        }

        let (owner, repo) = request
            .owner_repo()
            .ok_or_else(|| ResolveError::invalid_repository(&request.owner_repo_path))?;
        debug!(owner, repo, "no latest release, looking up most recent tag");

        let Some(tag) = self.api.latest_tag(owner, repo).await? else {
            info!(owner, repo, "repository has no release and no tags");
            return Ok(ReleaseMetadata::default());
        };

        let tag_url = request.tag_release_url(self.api.api_base(), &tag);
        debug!(%tag, %tag_url, "falling back to tag release");
        self.fetch_document(&tag_url).await
    }

    async fn fetch_document(&self, url: &str) -> Result<ReleaseMetadata, ResolveError> {
        let body = self.api.fetch(url).await?;
        serde_json::from_str(&body).map_err(|e| ResolveError::invalid_response(url, e.to_string()))
    }
}

impl std::fmt::Debug for MetadataResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataResolver")
            .field("api_base", &self.api.api_base())
            .finish()
    }
}
