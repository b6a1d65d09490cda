//! Integration tests for the parser module.
//!
//! These tests verify identifier normalization with realistic inputs.

use getghrel_core::parser::{
    DEFAULT_API_BASE, clean_line, is_release_asset_url, normalize, normalize_with_api_base,
};

/// Every identifier spelling of one repository normalizes to the same path.
#[test]
fn test_identifier_spellings_share_owner_repo_path() {
    let expected = normalize("sharkdp/bat").owner_repo_path;
    for identifier in [
        "https://github.com/sharkdp/bat",
        "https://github.com/sharkdp/bat/",
        "http://github.com/sharkdp/bat",
        "/sharkdp/bat",
        "sharkdp/bat/",
    ] {
        assert_eq!(normalize(identifier).owner_repo_path, expected, "{identifier}");
    }
}

#[test]
fn test_metadata_url_targets_latest_release() {
    let request = normalize("https://github.com/BurntSushi/ripgrep");
    assert_eq!(
        request.metadata_url,
        format!("{DEFAULT_API_BASE}/repos/BurntSushi/ripgrep/releases/latest")
    );
    assert_eq!(request.owner_repo(), Some(("BurntSushi", "ripgrep")));
}

#[test]
fn test_custom_api_base_for_enterprise_hosts() {
    let request = normalize_with_api_base("o/r", "https://ghe.example.com/api/v3/");
    assert_eq!(
        request.metadata_url,
        "https://ghe.example.com/api/v3/repos/o/r/releases/latest"
    );
    assert_eq!(
        request.tag_release_url("https://ghe.example.com/api/v3", "v1.0.0"),
        "https://ghe.example.com/api/v3/repos/o/r/releases/tags/v1.0.0"
    );
}

/// A piped input file with blanks and padding yields only the identifiers.
#[test]
fn test_input_lines_are_cleaned() {
    let input = "sharkdp/bat\n\n   \n  junegunn/fzf  \r\nhttps://github.com/cli/cli\n";
    let identifiers: Vec<_> = input.lines().filter_map(clean_line).collect();
    assert_eq!(
        identifiers,
        vec!["sharkdp/bat", "junegunn/fzf", "https://github.com/cli/cli"]
    );
}

/// List-mode output can be fed back into download mode.
#[test]
fn test_release_asset_urls_are_recognized() {
    assert!(is_release_asset_url(
        "https://github.com/sharkdp/bat/releases/download/v0.24.0/bat-v0.24.0-x86_64-unknown-linux-gnu.tar.gz"
    ));
    assert!(!is_release_asset_url("https://github.com/sharkdp/bat"));
    assert!(!is_release_asset_url("sharkdp/bat"));
}
