//! Authenticated streaming download of release assets.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_LENGTH};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::DOWNLOAD_TIMEOUT_SECS;
use super::error::DownloadError;
use super::filename::{asset_file_name, create_unique_file};
use super::progress::DownloadProgress;

/// A completed download, ready for the archive dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedAsset {
    /// Where the asset was written.
    pub source_path: PathBuf,
    /// Directory extraction output goes to.
    pub working_dir: PathBuf,
    /// Bytes written.
    pub bytes: u64,
}

impl DownloadedAsset {
    /// File name of the downloaded asset.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Removes a partially written file unless the download completed.
///
/// Dropping the download future (cancellation, a panicking worker) runs this
/// too, so no truncated asset ever survives.
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn commit(mut self) -> PathBuf {
        self.committed = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            debug!(path = %self.path.display(), "cleaning up partial file");
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Streams release assets to disk with the run's authenticated client.
#[derive(Debug, Clone)]
pub struct AssetDownloader {
    client: Client,
    timeout: Duration,
    progress: DownloadProgress,
}

impl AssetDownloader {
    /// Creates a downloader sharing `client` (and its credential headers).
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(DOWNLOAD_TIMEOUT_SECS),
            progress: DownloadProgress::hidden(),
        }
    }

    /// Sets the whole-request timeout for one download.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attaches a progress display.
    #[must_use]
    pub fn with_progress(mut self, progress: DownloadProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Downloads `url` into `dest_dir`.
    ///
    /// The file is named after `file_name` (or the URL's last segment) and
    /// renamed on collision. On any failure, including cancellation, the
    /// partial file is removed.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] for invalid URLs, transport failures,
    /// non-success statuses, disk errors, or cancellation.
    #[instrument(skip(self, cancel), fields(url = %url))]
    pub async fn download(
        &self,
        url: &str,
        file_name: Option<&str>,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<DownloadedAsset, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        let name = file_name
            .map(str::to_string)
            .filter(|name| !name.is_empty())
            .or_else(|| asset_file_name(url))
            .ok_or_else(|| DownloadError::invalid_url(url))?;

        debug!(%name, "starting download");
        let request = self
            .client
            .get(url)
            .header(ACCEPT, "application/octet-stream")
            .timeout(self.timeout)
            .send();
        let response = tokio::select! {
            () = cancel.cancelled() => return Err(DownloadError::cancelled(url)),
            result = request => result.map_err(|e| DownloadError::network(url, e))?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let (path, std_file) = create_unique_file(dest_dir, &name)
            .map_err(|e| DownloadError::io(dest_dir.join(&name), e))?;
        let partial = PartialFile::new(path.clone());
        let mut file = File::from_std(std_file);

        let bar = self.progress.start(&name, content_length);
        let streamed = tokio::select! {
            () = cancel.cancelled() => Err(DownloadError::cancelled(url)),
            result = stream_to_file(&mut file, response, url, &path, &bar) => result,
        };
        bar.finish_and_clear();
        drop(file);
        let bytes = streamed?;

        let source_path = partial.commit();
        info!(path = %source_path.display(), bytes, "download complete");

        Ok(DownloadedAsset {
            source_path,
            working_dir: dest_dir.to_path_buf(),
            bytes,
        })
    }
}

async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    bar: &indicatif::ProgressBar,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

        bytes_written += chunk.len() as u64;
        bar.inc(chunk.len() as u64);
    }

    // Ensure all data is flushed to disk
    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

    Ok(bytes_written)
}
