//! Transport seam for the GitHub REST and GraphQL APIs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::parser::DEFAULT_API_BASE;

use super::ResolveError;
use super::http_client::build_http_client;

/// Default timeout for a single metadata request.
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(30);

const GITHUB_JSON: &str = "application/vnd.github+json";

const LATEST_TAG_QUERY: &str = r#"query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    refs(refPrefix: "refs/tags/", first: 1, orderBy: {field: TAG_COMMIT_DATE, direction: DESC}) {
      edges { node { name } }
    }
  }
}"#;

/// Authenticated access to the GitHub APIs.
///
/// Implementations must be safe to share across workers.
#[async_trait]
pub trait GithubApi: Send + Sync {
    /// Returns the body of an authenticated GET for `url`.
    ///
    /// A 404 is not an error: its body carries the `"Not Found"` message the
    /// resolver uses to trigger the tag fallback.
    async fn fetch(&self, url: &str) -> Result<String, ResolveError>;

    /// Returns the most recent tag of `owner/repo` by tag commit date, or
    /// `None` when the repository has no tags.
    async fn latest_tag(&self, owner: &str, repo: &str) -> Result<Option<String>, ResolveError>;

    /// API base URL used to build follow-up URLs.
    fn api_base(&self) -> &str;
}

// ==================== GraphQL Response Types ====================

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<GraphQlData>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphQlData {
    repository: Option<GraphQlRepository>,
}

#[derive(Debug, Deserialize)]
struct GraphQlRepository {
    refs: Option<GraphQlRefs>,
}

#[derive(Debug, Deserialize)]
struct GraphQlRefs {
    #[serde(default)]
    edges: Vec<GraphQlEdge>,
}

#[derive(Debug, Deserialize)]
struct GraphQlEdge {
    node: GraphQlNode,
}

#[derive(Debug, Deserialize)]
struct GraphQlNode {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorEntry {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: Option<String>,
}

// ==================== GithubClient ====================

/// `reqwest`-backed [`GithubApi`].
#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl GithubClient {
    /// Creates a client for the public GitHub API.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Client`] if the HTTP client cannot be built.
    pub fn new(token: &str) -> Result<Self, ResolveError> {
        Self::with_base_url(token, DEFAULT_API_BASE)
    }

    /// Creates a client against an alternative API base (used by tests).
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Client`] if the HTTP client cannot be built.
    pub fn with_base_url(token: &str, base_url: impl Into<String>) -> Result<Self, ResolveError> {
        Ok(Self {
            client: build_http_client(token)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_METADATA_TIMEOUT,
        })
    }

    /// Sets the per-request timeout for metadata calls.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The underlying authenticated HTTP client, shared with downloads.
    #[must_use]
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Checks that the API accepts the credential.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Unauthorized`] on a 401 and other variants for
    /// transport or status failures.
    #[instrument(skip(self), fields(base = %self.base_url))]
    pub async fn validate_credentials(&self) -> Result<(), ResolveError> {
        let url = format!("{}/rate_limit", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, GITHUB_JSON)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ResolveError::from_reqwest(&url, e))?;

        let status = response.status();
        if status.is_success() {
            debug!("credentials accepted");
            return Ok(());
        }
        if status.as_u16() == 401 {
            return Err(ResolveError::unauthorized(url, 401));
        }
        let detail = response.text().await.ok().and_then(|body| api_message(&body));
        Err(ResolveError::http_status(url, status.as_u16(), detail))
    }
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GithubApi for GithubClient {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, ResolveError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, GITHUB_JSON)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ResolveError::from_reqwest(url, e))?;

        let status = response.status();
        debug!(status = status.as_u16(), "metadata response");
        if status.as_u16() == 401 {
            return Err(ResolveError::unauthorized(url, 401));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ResolveError::from_reqwest(url, e))?;

        if status.is_success() || status.as_u16() == 404 {
            Ok(body)
        } else {
            Err(ResolveError::http_status(
                url,
                status.as_u16(),
                api_message(&body),
            ))
        }
    }

    #[instrument(skip(self))]
    async fn latest_tag(&self, owner: &str, repo: &str) -> Result<Option<String>, ResolveError> {
        let url = format!("{}/graphql", self.base_url);
        let payload = json!({
            "query": LATEST_TAG_QUERY,
            "variables": { "owner": owner, "name": repo },
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ResolveError::from_reqwest(&url, e))?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ResolveError::unauthorized(url, 401));
        }
        let body = response
            .text()
            .await
            .map_err(|e| ResolveError::from_reqwest(&url, e))?;
        if !status.is_success() {
            return Err(ResolveError::http_status(
                url,
                status.as_u16(),
                api_message(&body),
            ));
        }

        let parsed: GraphQlResponse = serde_json::from_str(&body)
            .map_err(|e| ResolveError::invalid_response(&url, e.to_string()))?;

        if !parsed.errors.is_empty() {
            let message = parsed
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ResolveError::graphql(owner, repo, message));
        }

        let tag = parsed
            .data
            .and_then(|data| data.repository)
            .and_then(|repository| repository.refs)
            .and_then(|refs| refs.edges.into_iter().next())
            .map(|edge| edge.node.name)
            .filter(|name| !name.is_empty());
        debug!(?tag, "latest tag");
        Ok(tag)
    }

    fn api_base(&self) -> &str {
        &self.base_url
    }
}

fn api_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiMessage>(body)
        .ok()
        .and_then(|m| m.message)
}
