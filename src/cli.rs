//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use getghrel_core::parser::DEFAULT_API_BASE;
use getghrel_core::pipeline::DEFAULT_CONCURRENCY;
use getghrel_core::resolver::DEFAULT_METADATA_TIMEOUT;

/// Download GitHub release binaries for your platform.
///
/// Reads repository identifiers (`owner/repo` or GitHub URLs), one per line,
/// from stdin. In list mode prints the matching release asset URLs; in
/// download mode fetches them, unpacks archives and keeps only the
/// executables that run on the target platform.
#[derive(Parser, Debug)]
#[command(name = "getghrel")]
#[command(author, version, about)]
#[command(group(ArgGroup::new("mode").required(true).args(["list", "download"])))]
pub struct Args {
    /// Print matching asset URLs
    #[arg(short, long)]
    pub list: bool,

    /// Download, extract and prune matching assets
    #[arg(short, long)]
    pub download: bool,

    /// Number of repositories processed concurrently (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// GitHub token used for every API and download request
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub ghtoken: Option<String>,

    /// Working directory for downloads and binaries [default: <system temp>/getghrel]
    #[arg(long)]
    pub tempdir: Option<PathBuf>,

    /// Keep downloaded archives as-is (no extraction, no pruning)
    #[arg(long, requires = "download")]
    pub skip_extraction: bool,

    /// Target operating system instead of the host's (linux, darwin)
    #[arg(long)]
    pub os: Option<String>,

    /// Target architecture instead of the host's (amd64, arm64)
    #[arg(long)]
    pub arch: Option<String>,

    /// Metadata request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_METADATA_TIMEOUT.as_secs(), value_parser = clap::value_parser!(u64).range(1..=600))]
    pub timeout: u64,

    /// GitHub API base URL (GitHub Enterprise or a test server)
    #[arg(long, env = "GETGHREL_API_URL", default_value = DEFAULT_API_BASE, hide = true)]
    pub api_url: String,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Working directory, defaulting to `<system temp>/getghrel`.
    pub fn working_dir(&self) -> PathBuf {
        self.tempdir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("getghrel"))
    }

    /// Log level used when `RUST_LOG` is unset.
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}
