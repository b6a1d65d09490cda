//! Input parsing for repository identifiers.
//!
//! Identifiers arrive one per line, either as full repository URLs
//! (`https://github.com/owner/repo`) or as `owner/repo` shorthand.
//!
//! # Example
//!
//! ```
//! use getghrel_core::parser::{clean_line, normalize};
//!
//! let line = clean_line("  sharkdp/bat \n").unwrap();
//! assert_eq!(normalize(line).owner_repo_path, "/sharkdp/bat");
//! ```

mod identifier;

pub use identifier::{
    DEFAULT_API_BASE, NormalizedRequest, is_release_asset_url, normalize, normalize_with_api_base,
};

/// Trims an input line, returning `None` for blank lines.
#[must_use]
pub fn clean_line(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_line_skips_blank() {
        assert_eq!(clean_line(""), None);
        assert_eq!(clean_line("   \t"), None);
    }

    #[test]
    fn test_clean_line_trims() {
        assert_eq!(clean_line("\towner/repo \r"), Some("owner/repo"));
    }
}
