//! CLI entry point for getghrel.

use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use getghrel_core::download::{AssetDownloader, DownloadProgress};
use getghrel_core::pipeline::{Mode, OutputSink, Pipeline, PipelineConfig, RunReport};
use getghrel_core::platform::Platform;
use getghrel_core::resolver::GithubClient;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod cli;
mod exit;
mod terminal;

use cli::Args;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    terminal::init_tracing(args.default_log_level());
    debug!(?args, "CLI arguments parsed");

    let Some(token) = args.ghtoken.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
        bail!("a GitHub token is required\n  Suggestion: pass --ghtoken or set GITHUB_TOKEN");
    };

    let platform = resolve_platform(&args)?;
    info!(%platform, "target platform");

    let mode = if args.list {
        Mode::List
    } else {
        Mode::Download {
            skip_extraction: args.skip_extraction,
        }
    };

    let working_dir = args.working_dir();
    if matches!(mode, Mode::Download { .. }) {
        std::fs::create_dir_all(&working_dir).with_context(|| {
            format!("cannot create working directory {}", working_dir.display())
        })?;
        debug!(dir = %working_dir.display(), "working directory ready");
    }

    let api = GithubClient::with_base_url(token, &args.api_url)?
        .with_timeout(Duration::from_secs(args.timeout));
    api.validate_credentials()
        .await
        .context("GitHub rejected the credential check")?;

    let progress = if terminal::should_show_progress(
        std::io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    ) {
        DownloadProgress::stderr()
    } else {
        DownloadProgress::hidden()
    };
    let downloader = AssetDownloader::new(api.http_client().clone()).with_progress(progress);

    let config = PipelineConfig::new(mode, &working_dir, platform)
        .with_concurrency(usize::from(args.concurrency));
    let pipeline = Pipeline::new(config, Arc::new(api), downloader, OutputSink::stdout())?;

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping");
            signal.cancel();
        }
    });

    let report = pipeline
        .run(BufReader::new(tokio::io::stdin()), cancel)
        .await?;

    if let Mode::Download { skip_extraction } = mode {
        print_summary(&report, &working_dir, skip_extraction);
    }

    let outcome = exit::exit_for_summary(&report.summary);
    if report.summary.interrupted {
        warn!(
            processed = report.summary.processed,
            "interrupted; the working directory may hold partial results"
        );
    }
    debug!(?outcome, "exiting");
    Ok(outcome.code())
}

fn resolve_platform(args: &Args) -> Result<Platform> {
    let platform = match (args.os.as_deref(), args.arch.as_deref()) {
        (None, None) => Platform::host()?,
        (os, arch) => Platform::from_names(
            os.unwrap_or(std::env::consts::OS),
            arch.unwrap_or(std::env::consts::ARCH),
        )?,
    };
    Ok(platform)
}

fn print_summary(report: &RunReport, working_dir: &Path, skip_extraction: bool) {
    if let Some(prune) = &report.prune {
        info!(
            kept = prune.kept.len(),
            removed = prune.removed,
            failed = prune.failed,
            "pruned working directory"
        );
    }
    if skip_extraction {
        println!("Archives are inside: {}", working_dir.display());
    } else {
        println!("All Binaries are inside: {}", working_dir.display());
    }
}
