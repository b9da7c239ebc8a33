//! Loading configuration files from disk.

use std::path::PathBuf;

use reelforge::config::{self, ComposerBackend, QueueBackend};

fn write(dir: &tempfile::TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("reelforge.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_full_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        r#"
[paths]
work_dir = "/var/lib/reelforge/work"
log_dir = "/var/log/reelforge"

[run]
batch_size = 5
concurrency = 2
fail_on_item_error = true
replenish_below = 4

[retry]
max_attempts = 3
base_delay_ms = 500
max_delay_ms = 8000

[queue]
backend = "sqlite"
db_path = "/var/lib/reelforge/queue.db"

[generator]
model = "gemini-1.5-pro"
scenes_per_video = 6
theme = "Ancient Rome"

[composer]
backend = "creatomate"
timeout_secs = 1200

[publisher]
privacy_status = "unlisted"
default_tags = ["Rome"]

[tools]
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
"#,
    );

    let config = config::load_config(&path).unwrap();

    assert_eq!(config.run.batch_size, 5);
    assert_eq!(config.run.concurrency, 2);
    assert!(config.run.fail_on_item_error);
    assert_eq!(config.run.replenish_below, Some(4));
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.queue.backend, QueueBackend::Sqlite);
    assert_eq!(config.generator.scenes_per_video, 6);
    assert_eq!(config.generator.theme, "Ancient Rome");
    assert_eq!(config.composer.backend, ComposerBackend::Creatomate);
    assert_eq!(config.composer.timeout_secs, 1200);
    assert_eq!(config.publisher.privacy_status, "unlisted");
    assert_eq!(config.publisher.default_tags, vec!["Rome".to_string()]);
    assert_eq!(
        config.tools.ffmpeg_path,
        Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg"))
    );
    // Untouched sections keep their defaults
    assert_eq!(config.images.width, 540);
    assert_eq!(config.voice.model_id, "eleven_multilingual_v2");
    assert_eq!(config.paths.credentials_dir, PathBuf::from("./credentials"));
}

#[test]
fn test_empty_file_is_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "");

    let config = config::load_config(&path).unwrap();
    assert_eq!(config.run.batch_size, 3);
    assert_eq!(config.queue.backend, QueueBackend::Sheets);
    assert_eq!(config.composer.backend, ComposerBackend::Local);
}

#[test]
fn test_invalid_values_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "[composer]\nwidth = 541\n");

    let err = config::load_config(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("composer.width"));
}

#[test]
fn test_malformed_toml_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "[run\nbatch_size = ");

    let err = config::load_config(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    assert!(config::load_config_or_default(Some(&missing)).is_err());
}
