//! Credential loading from `.env` files and the process environment.
//!
//! These tests mutate process-wide environment variables, so they run
//! serially.

use reelforge::config::{Config, QueueBackend};
use reelforge::credentials::{
    CredentialScope, Credentials, ELEVENLABS_API_KEY, GEMINI_API_KEY, YOUTUBE_CLIENT_ID,
    YOUTUBE_CLIENT_SECRET, YOUTUBE_REFRESH_TOKEN,
};
use serial_test::serial;

const VARS: &[&str] = &[
    GEMINI_API_KEY,
    ELEVENLABS_API_KEY,
    YOUTUBE_CLIENT_ID,
    YOUTUBE_CLIENT_SECRET,
    YOUTUBE_REFRESH_TOKEN,
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

fn config_with_credentials_dir(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.queue.backend = QueueBackend::Sqlite;
    config.paths.credentials_dir = dir.to_path_buf();
    config
}

#[test]
#[serial]
fn test_dotenv_file_supplies_credentials() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".env"),
        "GEMINI_API_KEY=from-dotenv\nELEVENLABS_API_KEY=eleven\n\
YOUTUBE_CLIENT_ID=client\nYOUTUBE_CLIENT_SECRET=secret\nYOUTUBE_REFRESH_TOKEN=refresh\n",
    )
    .unwrap();

    let credentials =
        Credentials::load(&config_with_credentials_dir(dir.path()), CredentialScope::Run).unwrap();

    assert_eq!(credentials.gemini().unwrap().expose(), "from-dotenv");
    assert_eq!(credentials.youtube().unwrap().client_id, "client");
    clear_env();
}

#[test]
#[serial]
fn test_environment_wins_over_dotenv() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".env"), "GEMINI_API_KEY=from-dotenv\n").unwrap();
    std::env::set_var(GEMINI_API_KEY, "from-env");

    let credentials =
        Credentials::load(&config_with_credentials_dir(dir.path()), CredentialScope::Ideas)
            .unwrap();

    assert_eq!(credentials.gemini().unwrap().expose(), "from-env");
    clear_env();
}

#[test]
#[serial]
fn test_missing_credentials_are_listed() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var(GEMINI_API_KEY, "key");

    let err = Credentials::load(&config_with_credentials_dir(dir.path()), CredentialScope::Run)
        .unwrap_err();

    let message = err.to_string();
    assert!(message.starts_with("ConfigError: missing credentials: "));
    assert!(message.contains(ELEVENLABS_API_KEY));
    assert!(message.contains(YOUTUBE_REFRESH_TOKEN));
    assert!(!message.contains(GEMINI_API_KEY));
    clear_env();
}
