//! Integration tests for the rampload command-line interface
//!
//! Covers exit codes (0 pass, 99 failed thresholds, 104 configuration error),
//! scenario validation, the profile table, `init` and dry runs.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

/// Command running inside `dir` so no stray `rampload.toml` is picked up
fn cli_command(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("rampload").expect("Failed to find rampload binary");
    cmd.current_dir(dir)
        .env_remove("RAMPLOAD_CONFIG")
        .env_remove("RAMPLOAD_BASE_URL")
        .env_remove("RUST_LOG");
    cmd
}

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

const QUICK_SCENARIO: &str = r#"
name = "quick"
base_url = "http://localhost:8080"
start_vus = 2
iterations = 4

[[stages]]
duration = "30s"
target = 2

[thresholds]
http_req_failed = "rate<0.01"

[[scenario.steps]]
request = { name = "fast", path = "/api/fast" }
checks = [{ name = "fast status 200", status = 200 }]
"#;

#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    cli_command(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("profile"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_init_writes_valid_sample() {
    let dir = TempDir::new().unwrap();

    cli_command(dir.path()).arg("init").assert().success();
    assert!(dir.path().join("scenario.toml").exists());

    // refuses to overwrite
    cli_command(dir.path()).arg("init").assert().code(1);

    cli_command(dir.path())
        .args(["validate", "scenario.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stages:         5"))
        .stdout(predicate::str::contains("total duration: 3m 30s"))
        .stdout(predicate::str::contains("max VUs:        100"))
        .stdout(predicate::str::contains("http_req_duration: p(95)<500"));
}

#[test]
fn test_validate_rejects_negative_target() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "bad.toml",
        &QUICK_SCENARIO.replace("target = 2", "target = -2"),
    );

    cli_command(dir.path())
        .arg("validate")
        .arg(&path)
        .assert()
        .code(104)
        .stderr(predicate::str::contains("stage 0"));
}

#[test]
fn test_validate_rejects_bad_threshold() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "bad.toml",
        &QUICK_SCENARIO.replace("rate<0.01", "p(95)<500"),
    );

    cli_command(dir.path())
        .arg("validate")
        .arg(&path)
        .assert()
        .code(104);
}

#[test]
fn test_profile_prints_curve() {
    let dir = TempDir::new().unwrap();
    cli_command(dir.path()).arg("init").assert().success();

    cli_command(dir.path())
        .args(["profile", "scenario.toml", "--step", "1m"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2m"))
        .stdout(predicate::str::contains("100.00"));
}

#[test]
fn test_dry_run_passes() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "quick.toml", QUICK_SCENARIO);
    let json = dir.path().join("summary.json");

    cli_command(dir.path())
        .args(["run", "--dry-run", "--seed", "7", "--summary-json"])
        .arg(&json)
        .arg(&path)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("✓ http_req_failed rate<0.01"));

    let report = std::fs::read_to_string(&json).unwrap();
    assert!(report.contains("\"passed\": true"));
}

#[test]
fn test_dry_run_failed_threshold_exits_99() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "quick.toml",
        &QUICK_SCENARIO.replace(
            "http_req_failed = \"rate<0.01\"",
            "http_req_duration = \"max<1\"",
        ),
    );
    let md = dir.path().join("summary.md");

    cli_command(dir.path())
        .args(["run", "--dry-run", "--summary-md"])
        .arg(&md)
        .arg(&path)
        .assert()
        .code(99)
        .stdout(predicate::str::contains("✗ http_req_duration max<1"));

    assert!(std::fs::read_to_string(&md).unwrap().contains("FAILED"));
}

#[test]
fn test_invalid_settings_exit_104() {
    let dir = TempDir::new().unwrap();
    write(&dir, "rampload.toml", "[driver]\ntick_interval_ms = 0\n");
    let path = write(&dir, "quick.toml", QUICK_SCENARIO);

    cli_command(dir.path())
        .arg("validate")
        .arg(&path)
        .assert()
        .code(104)
        .stderr(predicate::str::contains("tick_interval_ms"));
}

#[test]
fn test_base_url_precedence() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "quick.toml", QUICK_SCENARIO);

    cli_command(dir.path())
        .arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("GET http://localhost:8080/api/fast (fast)"));

    cli_command(dir.path())
        .env("RAMPLOAD_BASE_URL", "http://from-env:9000")
        .arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("GET http://from-env:9000/api/fast (fast)"));

    cli_command(dir.path())
        .env("RAMPLOAD_BASE_URL", "http://from-env:9000")
        .args(["validate", "--base-url", "http://from-flag:7000"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("GET http://from-flag:7000/api/fast (fast)"))
        .stdout(predicate::str::contains("from-env").not());
}
