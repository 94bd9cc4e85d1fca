use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use keyline_core::config::Config;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_config_path_command() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("keyline")
        .env("KEYLINE_HOME", dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_creates_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    assert!(!config_path.exists());

    cargo_bin_cmd!("keyline")
        .env("KEYLINE_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config at"));

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("request_timeout_secs ="));
    assert!(contents.contains("# api_url ="));
}

#[test]
fn test_config_init_fails_if_exists() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "# existing config").unwrap();

    cargo_bin_cmd!("keyline")
        .env("KEYLINE_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_config_set_url_writes_value() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "request_timeout_secs = 5\n").unwrap();

    cargo_bin_cmd!("keyline")
        .env("KEYLINE_HOME", dir.path())
        .args(["config", "set-url", "https://auth.example.com/api"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved api_url"));

    let config = Config::load_from(&config_path).unwrap();
    assert_eq!(
        config.api_url.as_deref(),
        Some("https://auth.example.com/api")
    );
    assert_eq!(config.request_timeout_secs, 5);
}

#[test]
fn test_config_set_url_rejects_invalid_url() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("keyline")
        .env("KEYLINE_HOME", dir.path())
        .args(["config", "set-url", "not a url"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid API base URL"));

    assert!(!dir.path().join("config.toml").exists());
}

#[test]
fn test_status_reports_configured_url() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "api_url = \"https://auth.example.com/api\"\n",
    )
    .unwrap();

    cargo_bin_cmd!("keyline")
        .env("KEYLINE_HOME", dir.path())
        .env_remove("KEYLINE_API_URL")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not logged in"))
        .stdout(predicate::str::contains("API: https://auth.example.com/api"));
}

#[test]
fn test_api_url_flag_overrides_env() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("keyline")
        .env("KEYLINE_HOME", dir.path())
        .env("KEYLINE_API_URL", "https://env.example.com/api")
        .args(["--api-url", "https://flag.example.com/api", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("API: https://flag.example.com/api"));
}
