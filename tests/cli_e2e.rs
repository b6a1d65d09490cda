//! End-to-end CLI tests for the getghrel binary.

// `Command::cargo_bin` is deprecated in assert_cmd >=2.0.17 in favor of
// `cargo::cargo_bin_cmd!` macro. Suppressed until migration to the new API.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

fn getghrel() -> Command {
    let mut cmd = Command::cargo_bin("getghrel").unwrap();
    cmd.env_remove("GITHUB_TOKEN")
        .env_remove("GETGHREL_API_URL")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_binary_help_lists_modes() {
    getghrel()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--list"))
        .stdout(predicate::str::contains("--download"))
        .stdout(predicate::str::contains("--ghtoken"));
}

#[test]
fn test_binary_version_prints_crate_version() {
    getghrel()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_binary_requires_a_mode() {
    getghrel()
        .args(["--ghtoken", "t"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_binary_rejects_both_modes() {
    getghrel()
        .args(["-l", "-d", "--ghtoken", "t"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_binary_missing_token_is_fatal() {
    getghrel()
        .arg("--list")
        .write_stdin("sharkdp/bat\n")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("GitHub token is required"));
}

#[test]
fn test_binary_unsupported_platform_is_fatal() {
    getghrel()
        .args(["--list", "--ghtoken", "t", "--os", "windows", "--arch", "amd64"])
        .write_stdin("sharkdp/bat\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported platform"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_rejected_token_is_fatal() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})),
        )
        .mount(&mock_server)
        .await;

    getghrel()
        .args(["--list", "--ghtoken", "bad", "--os", "linux", "--arch", "amd64"])
        .env("GETGHREL_API_URL", mock_server.uri())
        .write_stdin("o/tool\n")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("credential"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_list_mode_prints_matches_and_na() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .and(header("authorization", "Bearer ghp_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resources": {}})))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/o/tool/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tag_name": "v1.0.0",
            "assets": [
                {"name": "tool-linux-amd64.tar.gz", "browser_download_url": "https://dl.test/tool-linux-amd64.tar.gz"},
                {"name": "tool-darwin-arm64.tar.gz", "browser_download_url": "https://dl.test/tool-darwin-arm64.tar.gz"},
                {"name": "tool-linux-amd64.sha256", "browser_download_url": "https://dl.test/tool-linux-amd64.sha256"}
            ]
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/o/docs/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "assets": [{"name": "manual.pdf", "browser_download_url": "https://dl.test/manual.pdf"}]
        })))
        .mount(&mock_server)
        .await;

    getghrel()
        .args(["--list", "--os", "linux", "--arch", "amd64", "-c", "1"])
        .env("GITHUB_TOKEN", "ghp_test")
        .env("GETGHREL_API_URL", mock_server.uri())
        .write_stdin("o/tool\n\no/docs\n")
        .assert()
        .success()
        .stdout("https://dl.test/tool-linux-amd64.tar.gz\nN/A: o/docs\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_skip_extraction_keeps_archives() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let workdir = TempDir::new().unwrap();
    let asset_url = format!(
        "{}/o/tool/releases/download/v1/tool-linux-amd64.tar.gz",
        mock_server.uri()
    );

    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/o/tool/releases/download/v1/tool-linux-amd64.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"archive bytes".to_vec()))
        .mount(&mock_server)
        .await;

    getghrel()
        .args(["--download", "--skip-extraction", "--ghtoken", "t"])
        .args(["--os", "linux", "--arch", "amd64"])
        .arg("--tempdir")
        .arg(workdir.path())
        .env("GETGHREL_API_URL", mock_server.uri())
        .write_stdin(format!("{asset_url}\n"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Downloaded: tool-linux-amd64.tar.gz"))
        .stdout(predicate::str::contains("Archives are inside:"));

    let archive = workdir.path().join("tool-linux-amd64.tar.gz");
    assert_eq!(std::fs::read(archive).unwrap(), b"archive bytes");
}
