//! Error types for release metadata resolution.
//!
//! Every variant is per-identifier: the worker that hit it logs it and moves
//! on. Only [`ResolveError::Unauthorized`] during credential validation is
//! fatal, and that decision belongs to the caller.

use thiserror::Error;

/// Errors that can occur while resolving release metadata.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Network-level failure (DNS, connection refused, TLS).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete within its timeout.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The API rejected the credential.
    #[error(
        "[AUTH] GitHub rejected the token (HTTP {status}) requesting {url}\n  Suggestion: check that GITHUB_TOKEN (or --ghtoken) is a valid, unexpired token"
    )]
    Unauthorized {
        /// The URL that was rejected.
        url: String,
        /// HTTP status code (401).
        status: u16,
    },

    /// Any other non-success HTTP status.
    #[error("HTTP {status} requesting {url}{}", format_detail(.detail.as_deref()))]
    HttpStatus {
        /// The URL that returned the status.
        url: String,
        /// HTTP status code.
        status: u16,
        /// API `message` field, when the body carried one.
        detail: Option<String>,
    },

    /// The response body was not the expected JSON document.
    #[error("unexpected response from {url}: {reason}")]
    InvalidResponse {
        /// The URL whose body failed to parse.
        url: String,
        /// Why parsing failed.
        reason: String,
    },

    /// The GraphQL API answered with errors.
    #[error("GraphQL query for {owner}/{repo} failed: {message}")]
    GraphQl {
        /// Repository owner.
        owner: String,
        /// Repository name.
        repo: String,
        /// Joined error messages.
        message: String,
    },

    /// The identifier does not name an `owner/repo` pair.
    #[error(
        "'{identifier}' is not an owner/repo path\n  Suggestion: use https://github.com/OWNER/REPO or OWNER/REPO"
    )]
    InvalidRepository {
        /// The offending path.
        identifier: String,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client construction failed: {reason}")]
    Client {
        /// What went wrong.
        reason: String,
    },
}

fn format_detail(detail: Option<&str>) -> String {
    detail.map(|d| format!(": {d}")).unwrap_or_default()
}

impl ResolveError {
    /// Maps a transport error, separating timeouts from other failures.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an `Unauthorized` error.
    pub fn unauthorized(url: impl Into<String>, status: u16) -> Self {
        Self::Unauthorized {
            url: url.into(),
            status,
        }
    }

    /// Creates an `HttpStatus` error.
    pub fn http_status(url: impl Into<String>, status: u16, detail: Option<String>) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            detail,
        }
    }

    /// Creates an `InvalidResponse` error.
    pub fn invalid_response(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `GraphQl` error.
    pub fn graphql(owner: &str, repo: &str, message: impl Into<String>) -> Self {
        Self::GraphQl {
            owner: owner.to_string(),
            repo: repo.to_string(),
            message: message.into(),
        }
    }

    /// Creates an `InvalidRepository` error.
    pub fn invalid_repository(identifier: impl Into<String>) -> Self {
        Self::InvalidRepository {
            identifier: identifier.into(),
        }
    }

    /// Creates a `Client` error.
    pub fn client(reason: impl Into<String>) -> Self {
        Self::Client {
            reason: reason.into(),
        }
    }

    /// Returns true if the credential was rejected.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_message_has_suggestion() {
        let err = ResolveError::unauthorized("https://api.github.com/rate_limit", 401);
        let msg = err.to_string();
        assert!(msg.contains("HTTP 401"));
        assert!(msg.contains("Suggestion"));
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_http_status_with_and_without_detail() {
        let bare = ResolveError::http_status("https://x", 502, None);
        assert_eq!(bare.to_string(), "HTTP 502 requesting https://x");

        let detailed =
            ResolveError::http_status("https://x", 403, Some("API rate limit exceeded".into()));
        assert_eq!(
            detailed.to_string(),
            "HTTP 403 requesting https://x: API rate limit exceeded"
        );
    }

    #[test]
    fn test_invalid_repository_names_input() {
        let err = ResolveError::invalid_repository("/justowner");
        assert!(err.to_string().contains("/justowner"));
        assert!(!err.is_unauthorized());
    }
}
