//! Shared HTTP client construction for GitHub API and asset traffic.
//!
//! One client serves every request in a run. It carries the credential and
//! the tool's User-Agent as default headers; timeouts are applied per request
//! because metadata calls and asset downloads need very different budgets.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, ClientBuilder, Proxy};
use tracing::warn;

use crate::download::constants::CONNECT_TIMEOUT_SECS;
use crate::user_agent;

use super::ResolveError;

/// Builds the authenticated HTTP client used for the whole run.
///
/// The `Authorization` header is marked sensitive so it never shows up in
/// debug output, and reqwest drops it when a redirect leaves the original
/// host (asset downloads redirect to a CDN).
///
/// # Errors
///
/// Returns [`ResolveError::Client`] when the token contains characters that
/// cannot appear in a header, or when client construction fails.
pub fn build_http_client(token: &str) -> Result<Client, ResolveError> {
    let headers = default_headers(token)?;

    match try_build_client(&headers, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some restricted macOS sandboxes panic when querying system
            // proxy settings. Fall back to env-proxy lookup only.
            warn!("HTTP client hit system proxy panic; using env-proxy fallback builder");
            match try_build_client(&headers, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(ResolveError::client(
                    "client construction panicked while initializing networking",
                )),
                Err(BuildClientFailure::Build(error)) => {
                    Err(ResolveError::client(error.to_string()))
                }
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(ResolveError::client(error.to_string())),
    }
}

fn default_headers(token: &str) -> Result<HeaderMap, ResolveError> {
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
        .map_err(|_| ResolveError::client("token contains characters not allowed in a header"))?;
    auth.set_sensitive(true);

    let agent = HeaderValue::from_str(&user_agent::default_user_agent())
        .map_err(|e| ResolveError::client(e.to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    headers.insert(USER_AGENT, agent);
    Ok(headers)
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    headers: &HeaderMap,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    let headers = headers.clone();
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(headers);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(headers: HeaderMap) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .gzip(true)
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    let names: &[&str] = match scheme {
        "https" => &["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"],
        "http" => &["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"],
        _ => return None,
    };
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
