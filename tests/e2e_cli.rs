//! End-to-end tests for the reelforge binary.
//!
//! Every test runs against a SQLite queue inside a temporary directory, so
//! no network credentials are needed.

use assert_cmd::Command;
use predicates::prelude::*;
use reelforge::queue::{QueueStore, SqliteQueue};
use reelforge_common::{ItemId, ItemStatus, QueueItem};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CREDENTIAL_VARS: &[&str] = &[
    "GEMINI_API_KEY",
    "ELEVENLABS_API_KEY",
    "CREATOMATE_API_KEY",
    "GOOGLE_SHEETS_SPREADSHEET_ID",
    "GOOGLE_APPLICATION_CREDENTIALS",
    "YOUTUBE_CLIENT_ID",
    "YOUTUBE_CLIENT_SECRET",
    "YOUTUBE_REFRESH_TOKEN",
];

#[allow(deprecated)]
fn reelforge_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("reelforge").unwrap();
    cmd.current_dir(dir);
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Write a config that keeps every path inside `dir`.
fn sqlite_config(dir: &TempDir) -> PathBuf {
    let root = dir.path();
    let config = format!(
        r#"
[paths]
work_dir = "{root}/work"
log_dir = "{root}/logs"
credentials_dir = "{root}/credentials"

[queue]
backend = "sqlite"
db_path = "{root}/queue.db"
"#,
        root = root.display()
    );
    let path = root.join("reelforge.toml");
    std::fs::write(&path, config).unwrap();
    path
}

/// The single `run-*.json` report in `logs/`, parsed.
fn run_report(dir: &TempDir) -> serde_json::Value {
    let report = std::fs::read_dir(dir.path().join("logs"))
        .unwrap()
        .filter_map(|e| e.ok())
        .find(|e| e.file_name().to_string_lossy().starts_with("run-"))
        .expect("run report written");
    serde_json::from_str(&std::fs::read_to_string(report.path()).unwrap()).unwrap()
}

/// A lock file naming this test process, which is alive for the whole test.
fn hold_lock(dir: &TempDir) -> PathBuf {
    let work = dir.path().join("work");
    std::fs::create_dir_all(&work).unwrap();
    let path = work.join("reelforge.lock");
    std::fs::write(&path, format!("pid={} started=2024-01-01T00:00:00Z\n", std::process::id()))
        .unwrap();
    path
}

#[test]
fn test_cli_help() {
    let dir = tempfile::tempdir().unwrap();
    reelforge_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("reset-stale"));
}

#[test]
fn test_cli_run_help() {
    let dir = tempfile::tempdir().unwrap();
    reelforge_cmd(dir.path())
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--retry-failed"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_cli_version() {
    let dir = tempfile::tempdir().unwrap();
    reelforge_cmd(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("reelforge "));
}

#[test]
fn test_cli_check_tools_lists_ffmpeg() {
    let dir = tempfile::tempdir().unwrap();
    reelforge_cmd(dir.path())
        .arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg"));
}

#[test]
fn test_cli_all_conflicts_with_limit() {
    let dir = tempfile::tempdir().unwrap();
    reelforge_cmd(dir.path())
        .args(["run", "--all", "--limit", "2"])
        .assert()
        .failure();
}

#[test]
fn test_cli_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    reelforge_cmd(dir.path())
        .args(["--config", "nope.toml", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ConfigError"));
}

#[test]
fn test_cli_validate_reports_missing_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(&dir);

    reelforge_cmd(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stderr(predicate::str::contains("ConfigError: missing credentials"))
        .stderr(predicate::str::contains("GEMINI_API_KEY"));
}

#[test]
fn test_cli_status_on_empty_queue() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(&dir);

    reelforge_cmd(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Queue (sqlite):"))
        .stdout(predicate::str::contains("empty"));
}

#[test]
fn test_cli_dry_run_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(&dir);

    reelforge_cmd(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[DRY RUN] Would process 0 item(s)"));

    assert!(!dir.path().join("work/reelforge.lock").exists());
    let reports = std::fs::read_dir(dir.path().join("logs"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("run-"))
        .count();
    assert_eq!(reports, 0);
}

#[test]
fn test_cli_run_without_credentials_writes_fatal_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(&dir);

    reelforge_cmd(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ConfigError"));

    let json = run_report(&dir);
    assert!(json["fatal"].as_str().unwrap().starts_with("ConfigError: "));
    assert!(!dir.path().join("work/reelforge.lock").exists());
}

#[test]
fn test_cli_run_while_locked_writes_fatal_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(&dir);
    let lock = hold_lock(&dir);

    reelforge_cmd(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already in progress"));

    let json = run_report(&dir);
    let fatal = json["fatal"].as_str().unwrap();
    assert!(fatal.starts_with("ConfigError: run already in progress"), "{}", fatal);
    assert!(lock.exists());
}

#[tokio::test]
async fn test_cli_malformed_service_account_leaves_items_pending() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(&dir);
    std::fs::write(
        &config,
        format!(
            "{}\n[composer]\nbackend = \"creatomate\"\n",
            std::fs::read_to_string(&config).unwrap()
        ),
    )
    .unwrap();
    let key_file = dir.path().join("service-account.json");
    std::fs::write(&key_file, "{\"type\": \"service_account\", \"client_email\": ").unwrap();

    let db = dir.path().join("queue.db");
    {
        let queue = SqliteQueue::open(&db).unwrap();
        queue
            .append(vec![
                QueueItem::new_pending(ItemId::new("1"), "POV: You are a scribe"),
                QueueItem::new_pending(ItemId::new("2"), "POV: You guard a tomb"),
            ])
            .await
            .unwrap();
    }

    reelforge_cmd(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("run")
        .env("GEMINI_API_KEY", "g")
        .env("ELEVENLABS_API_KEY", "e")
        .env("CREATOMATE_API_KEY", "c")
        .env("GOOGLE_APPLICATION_CREDENTIALS", &key_file)
        .env("YOUTUBE_CLIENT_ID", "id")
        .env("YOUTUBE_CLIENT_SECRET", "secret")
        .env("YOUTUBE_REFRESH_TOKEN", "refresh")
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed service account file"));

    let json = run_report(&dir);
    assert!(json["fatal"].as_str().unwrap().starts_with("ConfigError: "));
    assert_eq!(json["outcomes"].as_array().map(Vec::len), Some(0));

    let queue = SqliteQueue::open(&db).unwrap();
    for id in ["1", "2"] {
        let item = queue.get(&ItemId::new(id)).await.unwrap();
        assert_eq!(item.status, ItemStatus::Pending, "item {}", id);
    }
}

#[test]
fn test_cli_reset_stale_refuses_while_locked() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(&dir);
    hold_lock(&dir);

    reelforge_cmd(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("reset-stale")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already in progress"));
}
