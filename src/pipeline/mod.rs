//! Concurrent retrieval pipeline.
//!
//! One producer reads identifiers from the input stream into an unbounded
//! channel. A fixed pool of workers shares the receiving end and drains it;
//! each identifier is handled start to finish by one worker: resolve, match,
//! then (download mode) download and extract every matched asset.
//!
//! # Concurrency Model
//!
//! - The producer closes the channel at end of input
//! - Workers exit once the channel is closed and drained
//! - A [`CancellationToken`] stops the producer, workers between identifiers,
//!   and every in-flight request
//! - Pruning runs only after every worker has joined
//!
//! Errors for one identifier are logged and counted; they never reach other
//! workers or abort the run.

mod output;
mod stats;

pub use output::{CapturedOutput, OutputSink};
pub use stats::{RunStats, RunSummary};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::download::{AssetDownloader, DownloadError, asset_file_name, sanitize_filename};
use crate::extract::{ExtractOutcome, extract_in_background};
use crate::parser::{clean_line, is_release_asset_url, normalize_with_api_base};
use crate::platform::{Platform, PlatformError, PlatformPattern};
use crate::prune::{PruneError, PruneReport, Pruner, STAGING_DIR_NAME};
use crate::resolver::{GithubApi, MetadataResolver, ReleaseMetadata, ResolveError};

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default number of workers.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Asset URLs matched for one identifier.
pub type MatchSet = BTreeSet<String>;

/// What the run does with matched assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Print matched asset URLs.
    List,
    /// Download (and unless skipped, extract and prune) matched assets.
    Download {
        /// Keep archives as downloaded; no extraction, no pruning.
        skip_extraction: bool,
    },
}

/// Errors that abort a run before or after the workers.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Concurrency outside the accepted range.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
    },

    /// The platform pattern could not be built.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// The working directory could not be prepared.
    #[error("cannot prepare working directory {path}: {source}")]
    WorkingDir {
        /// The directory.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The final pruning pass failed.
    #[error(transparent)]
    Prune(#[from] PruneError),

    /// The pruning task did not complete.
    #[error("pruning task failed: {0}")]
    PruneTask(String),
}

impl PipelineError {
    fn working_dir(path: &Path, source: std::io::Error) -> Self {
        Self::WorkingDir {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// List or download.
    pub mode: Mode,
    /// Number of workers.
    pub concurrency: usize,
    /// Where downloads and binaries accumulate.
    pub working_dir: PathBuf,
    /// Target platform for matching and pruning.
    pub platform: Platform,
}

impl PipelineConfig {
    /// Config with the default concurrency.
    #[must_use]
    pub fn new(mode: Mode, working_dir: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            mode,
            concurrency: DEFAULT_CONCURRENCY,
            working_dir: working_dir.into(),
            platform,
        }
    }

    /// Sets the worker count.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Counters.
    pub summary: RunSummary,
    /// Pruning result, when pruning ran.
    pub prune: Option<PruneReport>,
}

/// The resolve/match/download pipeline.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    worker: Arc<Worker>,
}

impl Pipeline {
    /// Builds a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConcurrency`] outside 1..=100 and
    /// [`PipelineError::Platform`] if the platform pattern fails to compile.
    pub fn new(
        config: PipelineConfig,
        api: Arc<dyn GithubApi>,
        downloader: AssetDownloader,
        output: OutputSink,
    ) -> Result<Self, PipelineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&config.concurrency) {
            return Err(PipelineError::InvalidConcurrency {
                value: config.concurrency,
            });
        }
        let pattern = PlatformPattern::new(config.platform)?;
        debug!(
            concurrency = config.concurrency,
            platform = %config.platform,
            mode = ?config.mode,
            "creating pipeline"
        );

        let worker = Worker {
            api_base: api.api_base().to_string(),
            resolver: MetadataResolver::new(api),
            pattern,
            downloader,
            output,
            stats: RunStats::new(),
            mode: config.mode,
            working_dir: config.working_dir.clone(),
            staging_root: config.working_dir.join(STAGING_DIR_NAME),
            staged: AtomicUsize::new(0),
        };

        Ok(Self {
            config,
            worker: Arc::new(worker),
        })
    }

    /// Runs to completion over `input`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] only for run-level failures (working
    /// directory, pruning). Per-identifier failures are counted in the
    /// returned summary.
    #[instrument(
        skip(self, input, cancel),
        fields(mode = ?self.config.mode, workers = self.config.concurrency)
    )]
    pub async fn run<R>(
        self,
        input: R,
        cancel: CancellationToken,
    ) -> Result<RunReport, PipelineError>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let download = matches!(self.config.mode, Mode::Download { .. });
        if download {
            let dir = &self.worker.staging_root;
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| PipelineError::working_dir(dir, e))?;
        }

        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let rx = Arc::new(Mutex::new(rx));

        let producer = tokio::spawn(produce(input, tx, cancel.clone()));

        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(self.config.concurrency);
        for worker_id in 0..self.config.concurrency {
            let worker = Arc::clone(&self.worker);
            let rx = Arc::clone(&rx);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                worker.drain(worker_id, &rx, &cancel).await;
            }));
        }

        match producer.await {
            Ok(lines) => debug!(lines, "input exhausted"),
            Err(e) => warn!(error = %e, "input reader task panicked"),
        }
        for handle in handles {
            // Task panics are logged but don't fail the run
            if let Err(e) = handle.await {
                warn!(error = %e, "worker task panicked");
            }
        }

        if cancel.is_cancelled() {
            self.worker.stats.mark_interrupted();
        }

        let prune = if self.config.mode == (Mode::Download { skip_extraction: false }) {
            Some(self.prune().await?)
        } else {
            if download {
                remove_dir_if_empty(&self.worker.staging_root).await;
            }
            None
        };

        let summary = self.worker.stats.snapshot();
        info!(
            processed = summary.processed,
            not_found = summary.not_found,
            failed = summary.failed,
            downloaded = summary.downloaded,
            extracted = summary.extracted,
            interrupted = summary.interrupted,
            "run complete"
        );
        Ok(RunReport { summary, prune })
    }

    async fn prune(&self) -> Result<PruneReport, PipelineError> {
        let pruner = Pruner::new(self.config.platform.image_format());
        let working_dir = self.config.working_dir.clone();
        tokio::task::spawn_blocking(move || pruner.prune(&working_dir))
            .await
            .map_err(|e| PipelineError::PruneTask(e.to_string()))?
            .map_err(PipelineError::from)
    }
}

/// Reads identifiers into the queue; returns the number queued.
///
/// Lines that are not valid UTF-8 are skipped with a warning; reading
/// continues with the next line.
async fn produce<R>(
    input: R,
    tx: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut segments = input.split(b'\n');
    let mut queued = 0;
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            segment = segments.next_segment() => segment,
        };
        let raw = match next {
            Ok(Some(raw)) => raw,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "failed to read input, stopping");
                break;
            }
        };
        let Ok(line) = String::from_utf8(raw) else {
            warn!("skipping input line that is not valid UTF-8");
            continue;
        };
        let Some(identifier) = clean_line(&line) else {
            continue;
        };
        if tx.send(identifier.to_string()).is_err() {
            break;
        }
        queued += 1;
    }
    queued
}

async fn remove_dir_if_empty(dir: &Path) {
    // Fails when non-empty; that is the intended outcome.
    let _ = tokio::fs::remove_dir(dir).await;
}

/// State shared by all workers of one run.
struct Worker {
    resolver: MetadataResolver,
    api_base: String,
    pattern: PlatformPattern,
    downloader: AssetDownloader,
    output: OutputSink,
    stats: RunStats,
    mode: Mode,
    working_dir: PathBuf,
    staging_root: PathBuf,
    staged: AtomicUsize,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("mode", &self.mode)
            .field("platform", &self.pattern.platform())
            .field("working_dir", &self.working_dir)
            .finish_non_exhaustive()
    }
}

/// How one identifier ended.
enum Outcome {
    Done,
    NotFound,
    Failed,
    Cancelled,
}

impl Worker {
    async fn drain(
        &self,
        worker_id: usize,
        rx: &Mutex<mpsc::UnboundedReceiver<String>>,
        cancel: &CancellationToken,
    ) {
        loop {
            let next = {
                let mut rx = rx.lock().await;
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    item = rx.recv() => item,
                }
            };
            let Some(identifier) = next else {
                break;
            };
            debug!(worker_id, %identifier, "dequeued identifier");
            self.stats.increment_processed();

            let mut lines = Vec::new();
            match self.process(&identifier, &mut lines, cancel).await {
                Outcome::Done => {}
                Outcome::NotFound => self.stats.increment_not_found(),
                Outcome::Failed => self.stats.increment_failed(),
                Outcome::Cancelled => {
                    debug!(worker_id, %identifier, "cancelled mid-identifier");
                    self.stats.increment_failed();
                }
            }
            if let Err(e) = self.output.write_lines(&lines) {
                warn!(error = %e, "failed to write output");
            }
        }
        debug!(worker_id, "worker finished");
    }

    #[instrument(skip(self, lines, cancel))]
    async fn process(
        &self,
        identifier: &str,
        lines: &mut Vec<String>,
        cancel: &CancellationToken,
    ) -> Outcome {
        let matches = if is_release_asset_url(identifier) {
            debug!("direct asset URL, skipping metadata lookup");
            MatchSet::from([identifier.to_string()])
        } else {
            let request = normalize_with_api_base(identifier, &self.api_base);
            let resolved = tokio::select! {
                biased;
                () = cancel.cancelled() => return Outcome::Cancelled,
                result = self.resolver.resolve(&request) => result,
            };
            match resolved {
                Ok(release) => self.match_assets(&release),
                Err(e) => {
                    log_resolve_error(identifier, &e);
                    return Outcome::Failed;
                }
            }
        };

        if matches.is_empty() {
            info!(%identifier, platform = %self.pattern.platform(), "no matching asset");
            lines.push(format!("N/A: {identifier}"));
            return Outcome::NotFound;
        }

        match self.mode {
            Mode::List => {
                lines.extend(matches);
                Outcome::Done
            }
            Mode::Download { skip_extraction } => {
                self.download_all(&matches, skip_extraction, lines, cancel)
                    .await
            }
        }
    }

    fn match_assets(&self, release: &ReleaseMetadata) -> MatchSet {
        release
            .assets
            .iter()
            .filter(|asset| {
                asset
                    .file_name()
                    .is_some_and(|name| self.pattern.matches(&name))
            })
            .map(|asset| asset.browser_download_url.clone())
            .collect()
    }

    async fn download_all(
        &self,
        matches: &MatchSet,
        skip_extraction: bool,
        lines: &mut Vec<String>,
        cancel: &CancellationToken,
    ) -> Outcome {
        let mut succeeded = 0usize;
        for url in matches {
            if cancel.is_cancelled() {
                return Outcome::Cancelled;
            }
            match self.fetch_asset(url, skip_extraction, cancel).await {
                Ok(line) => {
                    lines.push(line);
                    succeeded += 1;
                }
                Err(AssetFailure::Cancelled) => return Outcome::Cancelled,
                Err(AssetFailure::Failed) => {}
            }
        }
        if succeeded == 0 {
            Outcome::Failed
        } else {
            Outcome::Done
        }
    }

    /// Downloads and unpacks one asset, returning its output line.
    async fn fetch_asset(
        &self,
        url: &str,
        skip_extraction: bool,
        cancel: &CancellationToken,
    ) -> Result<String, AssetFailure> {
        let name = asset_file_name(url).unwrap_or_else(|| "asset".to_string());
        let dest = if skip_extraction {
            self.working_dir.clone()
        } else {
            let n = self.staged.fetch_add(1, Ordering::SeqCst);
            let dir = self
                .staging_root
                .join(format!("{n}-{}", sanitize_filename(&name)));
            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                warn!(path = %dir.display(), error = %e, "cannot create staging directory");
                return Err(AssetFailure::Failed);
            }
            dir
        };

        let asset = match self.downloader.download(url, Some(&name), &dest, cancel).await {
            Ok(asset) => asset,
            Err(DownloadError::Cancelled { .. }) => return Err(AssetFailure::Cancelled),
            Err(e) => {
                warn!(%url, error = %e, "download failed");
                return Err(AssetFailure::Failed);
            }
        };
        self.stats.increment_downloaded();
        let file_name = asset.file_name();

        if skip_extraction {
            return Ok(format!("Downloaded: {file_name}"));
        }

        match extract_in_background(asset.source_path.clone(), asset.working_dir.clone()).await {
            Ok(ExtractOutcome::Extracted { files }) => {
                debug!(%file_name, files = files.len(), "extracted");
                self.stats.increment_extracted();
                Ok(format!("Downloaded and Extracted: {file_name}"))
            }
            Ok(ExtractOutcome::BareBinary) => Ok(format!("Downloaded: {file_name}")),
            Err(e) if e.is_unsupported() => {
                warn!(error = %e, "left as downloaded");
                Ok(format!("Downloaded: {file_name}"))
            }
            Err(e) => {
                warn!(error = %e, "extraction failed");
                Err(AssetFailure::Failed)
            }
        }
    }
}

enum AssetFailure {
    Failed,
    Cancelled,
}

fn log_resolve_error(identifier: &str, error: &ResolveError) {
    if error.is_unauthorized() {
        warn!(%identifier, error = %error, "credential rejected");
    } else {
        warn!(%identifier, error = %error, "failed to resolve release");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::platform::{Arch, Os};
    use crate::resolver::build_http_client;
    use async_trait::async_trait;
    use std::collections::HashMap;

    const BASE: &str = "https://api.test";

    struct FakeApi {
        bodies: HashMap<String, String>,
    }

    #[async_trait]
    impl GithubApi for FakeApi {
        async fn fetch(&self, url: &str) -> Result<String, ResolveError> {
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| ResolveError::http_status(url, 500, None))
        }

        async fn latest_tag(
            &self,
            _owner: &str,
            _repo: &str,
        ) -> Result<Option<String>, ResolveError> {
            Ok(None)
        }

        fn api_base(&self) -> &str {
            BASE
        }
    }

    fn release(names: &[&str]) -> String {
        let assets: Vec<_> = names
            .iter()
            .map(|n| {
                serde_json::json!({
                    "name": n,
                    "browser_download_url": format!("https://dl.test/{n}")
                })
            })
            .collect();
        serde_json::json!({ "assets": assets }).to_string()
    }

    fn fake_api() -> Arc<FakeApi> {
        let mut bodies = HashMap::new();
        bodies.insert(
            "https://api.test/repos/o/tool/releases/latest".to_string(),
            release(&[
                "tool-linux-amd64.tar.gz",
                "tool-darwin-arm64.tar.gz",
                "tool-linux-amd64.sha256",
            ]),
        );
        bodies.insert(
            "https://api.test/repos/o/docs/releases/latest".to_string(),
            release(&["docs.pdf"]),
        );
        Arc::new(FakeApi { bodies })
    }

    async fn list_run(input: &'static str, concurrency: usize) -> (RunReport, Vec<String>) {
        list_run_bytes(input.as_bytes(), concurrency).await
    }

    async fn list_run_bytes(input: &'static [u8], concurrency: usize) -> (RunReport, Vec<String>) {
        let (sink, captured) = OutputSink::capture();
        let config = PipelineConfig::new(
            Mode::List,
            std::env::temp_dir(),
            Platform::new(Os::Linux, Arch::Amd64),
        )
        .with_concurrency(concurrency);
        let downloader = AssetDownloader::new(build_http_client("t").unwrap());
        let pipeline = Pipeline::new(config, fake_api(), downloader, sink).unwrap();
        let report = pipeline
            .run(input, CancellationToken::new())
            .await
            .unwrap();
        (report, captured.lines())
    }

    #[tokio::test]
    async fn test_list_mode_prints_matches_and_na() {
        let (report, mut lines) = list_run("o/tool\n\n  o/docs  \n", 2).await;
        lines.sort();
        assert_eq!(
            lines,
            vec!["N/A: o/docs", "https://dl.test/tool-linux-amd64.tar.gz"]
        );
        assert_eq!(report.summary.processed, 2);
        assert_eq!(report.summary.not_found, 1);
        assert_eq!(report.summary.failed, 0);
        assert!(report.prune.is_none());
    }

    #[tokio::test]
    async fn test_resolve_failure_is_counted_not_fatal() {
        let (report, lines) = list_run("o/unknown\no/tool\n", 1).await;
        assert_eq!(lines, vec!["https://dl.test/tool-linux-amd64.tar.gz"]);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.succeeded(), 1);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_does_not_stop_input() {
        let (report, lines) = list_run_bytes(b"bad\xff\xfe/repo\no/tool\n", 1).await;
        assert_eq!(lines, vec!["https://dl.test/tool-linux-amd64.tar.gz"]);
        assert_eq!(report.summary.processed, 1);
        assert_eq!(report.summary.failed, 0);
    }

    #[tokio::test]
    async fn test_last_line_without_newline_is_read() {
        let (_, lines) = list_run("o/docs\no/tool", 1).await;
        assert_eq!(lines.len(), 2);
        assert!(lines.contains(&"https://dl.test/tool-linux-amd64.tar.gz".to_string()));
    }

    #[tokio::test]
    async fn test_direct_asset_url_is_echoed_in_list_mode() {
        let (_, lines) =
            list_run("https://github.com/o/r/releases/download/v1/tool-linux-amd64\n", 1).await;
        assert_eq!(lines, vec!["https://github.com/o/r/releases/download/v1/tool-linux-amd64"]);
    }

    #[tokio::test]
    async fn test_concurrency_does_not_change_output_set() {
        let input = "o/tool\no/docs\no/tool\no/missing\no/docs\no/tool\n";
        let (_, mut one) = list_run(input, 1).await;
        let (_, mut eight) = list_run(input, 8).await;
        one.sort();
        eight.sort();
        assert_eq!(one, eight);
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_interruption() {
        let (sink, captured) = OutputSink::capture();
        let config = PipelineConfig::new(
            Mode::List,
            std::env::temp_dir(),
            Platform::new(Os::Linux, Arch::Amd64),
        );
        let downloader = AssetDownloader::new(build_http_client("t").unwrap());
        let pipeline = Pipeline::new(config, fake_api(), downloader, sink).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = pipeline.run(&b"o/tool\n"[..], cancel).await.unwrap();

        assert!(report.summary.interrupted);
        assert!(captured.lines().is_empty());
    }

    #[test]
    fn test_invalid_concurrency_rejected() {
        for value in [0, 101] {
            let config = PipelineConfig::new(
                Mode::List,
                std::env::temp_dir(),
                Platform::new(Os::Linux, Arch::Amd64),
            )
            .with_concurrency(value);
            let downloader = AssetDownloader::new(build_http_client("t").unwrap());
            let err = Pipeline::new(config, fake_api(), downloader, OutputSink::capture().0)
                .unwrap_err();
            assert!(matches!(err, PipelineError::InvalidConcurrency { .. }));
        }
    }
}
