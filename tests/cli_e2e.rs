//! End-to-end CLI tests for the dataretriever binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Binary command isolated from any user config file.
fn command(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dataretriever").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let config_home = TempDir::new().unwrap();
    command(&config_home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--pattern"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_binary_version_displays_version() {
    let config_home = TempDir::new().unwrap();
    command(&config_home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dataretriever"));
}

#[test]
fn test_binary_without_locators_fails() {
    let config_home = TempDir::new().unwrap();
    command(&config_home)
        .args(["--start", "2020-01-01", "--end", "2020-01-02"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_dry_run_lists_pattern_records() {
    let config_home = TempDir::new().unwrap();
    command(&config_home)
        .args([
            "--pattern",
            "https://archive.test/%Y/%m/%d/eve_%Y%m%d.fits",
            "--start",
            "2020-01-01",
            "--end",
            "2020-01-03",
            "--instrument",
            "EVE",
            "--dry-run",
            "-q",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://archive.test/2020/01/01/eve_20200101.fits"))
        .stdout(predicate::str::contains("https://archive.test/2020/01/03/eve_20200103.fits"))
        .stdout(predicate::str::contains("2020/01/02 00:00:00"));
}

#[test]
fn test_binary_dry_run_json_output() {
    let config_home = TempDir::new().unwrap();
    let output = command(&config_home)
        .args([
            "https://h.test/a.fits",
            "https://h.test/b.fits",
            "--start",
            "2020-01-01",
            "--end",
            "2020-01-02",
            "--source",
            "SDO",
            "--dry-run",
            "--json",
            "-q",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let records = value["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["url"], "https://h.test/a.fits");
    assert_eq!(records[1]["source"], "SDO");
}

#[test]
fn test_binary_uses_time_format_from_config_file() {
    let config_home = TempDir::new().unwrap();
    let dir = config_home.path().join("dataretriever");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "time_format = \"%d.%m.%Y\"\n").unwrap();

    command(&config_home)
        .args([
            "https://h.test/a.fits",
            "--start",
            "2020-01-01",
            "--end",
            "2020-01-02",
            "--dry-run",
            "-q",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("01.01.2020"));
}

#[test]
fn test_binary_rejects_invalid_config_file() {
    let config_home = TempDir::new().unwrap();
    let dir = config_home.path().join("dataretriever");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "max_concurrency = 500\n").unwrap();

    command(&config_home)
        .args([
            "https://h.test/a.fits",
            "--start",
            "2020-01-01",
            "--end",
            "2020-01-02",
            "--dry-run",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config.toml"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_downloads_and_exits_nonzero_on_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.fits"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"alpha".to_vec()))
        .mount(&server)
        .await;
    let config_home = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();

    let good = format!("{}/a.fits", server.uri());
    let missing = format!("{}/missing.fits", server.uri());
    command(&config_home)
        .args([
            good.as_str(),
            missing.as_str(),
            "--start",
            "2020-01-01",
            "--end",
            "2020-01-02",
            "-o",
            &out_dir.path().display().to_string(),
            "-q",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("a.fits"));

    assert_eq!(std::fs::read(out_dir.path().join("a.fits")).unwrap(), b"alpha");
    assert!(!out_dir.path().join("missing.fits").exists());
}
