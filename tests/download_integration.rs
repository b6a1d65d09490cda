//! Integration tests for the download module.
//!
//! These tests verify the full download flow with mock HTTP servers.

use getghrel_core::download::{AssetDownloader, DownloadError};
use getghrel_core::resolver::build_http_client;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

/// Helper to mount a release asset endpoint.
async fn mount_asset(server: &MockServer, path_str: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(path_str))
        .and(header("authorization", "Bearer ghp_test"))
        .and(header("accept", "application/octet-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(server)
        .await;
}

fn downloader() -> AssetDownloader {
    AssetDownloader::new(build_http_client("ghp_test").unwrap())
}

#[tokio::test]
async fn test_download_full_flow_preserves_content() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let content = b"\x7fELF complete asset content\nLine 2.\nLine 3.";
    mount_asset(&mock_server, "/o/r/releases/download/v1/tool-linux-amd64", content).await;
    let temp_dir = TempDir::new().unwrap();

    let url = format!("{}/o/r/releases/download/v1/tool-linux-amd64", mock_server.uri());
    let asset = downloader()
        .download(&url, None, temp_dir.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(asset.file_name(), "tool-linux-amd64");
    assert_eq!(asset.working_dir, temp_dir.path());
    assert_eq!(asset.bytes, content.len() as u64);
    assert_eq!(std::fs::read(&asset.source_path).unwrap(), content);
}

#[tokio::test]
async fn test_repeated_download_gets_numbered_name() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_asset(&mock_server, "/dl/tool.tar.gz", b"archive").await;
    let temp_dir = TempDir::new().unwrap();
    let url = format!("{}/dl/tool.tar.gz", mock_server.uri());
    let cancel = CancellationToken::new();

    let first = downloader()
        .download(&url, None, temp_dir.path(), &cancel)
        .await
        .unwrap();
    let second = downloader()
        .download(&url, None, temp_dir.path(), &cancel)
        .await
        .unwrap();

    assert_eq!(first.file_name(), "tool.tar.gz");
    assert_eq!(second.file_name(), "tool_1.tar.gz");
}

#[tokio::test]
async fn test_server_error_leaves_no_file() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/dl/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    let temp_dir = TempDir::new().unwrap();

    let err = downloader()
        .download(
            &format!("{}/dl/broken", mock_server.uri()),
            None,
            temp_dir.path(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::HttpStatus { status: 500, .. }));
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_forbidden_download_is_an_auth_error() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/dl/private"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;
    let temp_dir = TempDir::new().unwrap();

    let err = downloader()
        .download(
            &format!("{}/dl/private", mock_server.uri()),
            None,
            temp_dir.path(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::AuthRequired { status: 403, .. }));
}
