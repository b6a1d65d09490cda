//! Shared User-Agent string for API and download HTTP clients.
//!
//! GitHub rejects API requests without a User-Agent, so every client built by
//! this crate sends the same identifying header.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/kavishgr/getghrel";

/// Default User-Agent for API and asset download requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("getghrel-cli/{version} (+{PROJECT_UA_URL})")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_crate_version() {
        let ua = default_user_agent();
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            ua.strip_prefix("getghrel-cli/")
                .and_then(|s| s.split(' ').next())
                .unwrap(),
            "UA must contain crate version"
        );
    }

    #[test]
    fn test_user_agent_contains_project_url() {
        assert!(default_user_agent().contains(PROJECT_UA_URL));
    }
}
