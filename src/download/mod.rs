//! Authenticated streaming downloads of release assets.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large archives)
//! - Credential and User-Agent headers shared with the metadata client
//! - Per-request timeout (5 min by default) and cancellation
//! - Partial files removed on failure or cancellation
//! - Duplicate filename handling (adds numeric suffix)
//! - Optional byte progress bars
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use getghrel_core::download::AssetDownloader;
//! use getghrel_core::resolver::build_http_client;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = AssetDownloader::new(build_http_client("ghp_example")?);
//! let asset = downloader
//!     .download(
//!         "https://github.com/sharkdp/bat/releases/download/v0.24.0/bat-v0.24.0-x86_64-unknown-linux-gnu.tar.gz",
//!         None,
//!         Path::new("/tmp/getghrel"),
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! println!("Downloaded: {}", asset.source_path.display());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod filename;
mod progress;

pub use client::{AssetDownloader, DownloadedAsset};
pub use error::DownloadError;
pub use filename::asset_file_name;
pub use progress::DownloadProgress;

pub(crate) use filename::{create_unique_file, resolve_unique_path, sanitize_filename};
