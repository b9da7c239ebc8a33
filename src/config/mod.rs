mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Locations searched, in order, when no `--config` is given.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "./reelforge.toml",
    "./config.toml",
    "~/.config/reelforge/config.toml",
    "/etc/reelforge/config.toml",
];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    match find_default_config() {
        Some(path) => load_config(&path),
        None => Ok(Config::default()),
    }
}

/// First existing file among [`DEFAULT_CONFIG_PATHS`].
pub fn find_default_config() -> Option<PathBuf> {
    DEFAULT_CONFIG_PATHS.iter().find_map(|path_str| {
        let path = PathBuf::from(shellexpand::tilde(path_str).as_ref());
        path.exists().then_some(path)
    })
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.run.batch_size == 0 {
        anyhow::bail!("run.batch_size must be at least 1");
    }
    if config.run.concurrency == 0 {
        anyhow::bail!("run.concurrency must be at least 1");
    }
    if config.retry.max_attempts == 0 {
        anyhow::bail!("retry.max_attempts must be at least 1");
    }
    if config.retry.base_delay_ms > config.retry.max_delay_ms {
        anyhow::bail!("retry.base_delay_ms cannot exceed retry.max_delay_ms");
    }
    if config.http.request_timeout_secs == 0 {
        anyhow::bail!("http.request_timeout_secs must be at least 1");
    }
    if config.generator.scenes_per_video == 0 {
        anyhow::bail!("generator.scenes_per_video must be at least 1");
    }
    if config.images.requests_per_minute == 0 {
        anyhow::bail!("images.requests_per_minute must be at least 1");
    }

    let composer = &config.composer;
    for (name, value) in [("width", composer.width), ("height", composer.height)] {
        if value == 0 || value % 2 != 0 {
            anyhow::bail!("composer.{} must be a positive even number, got {}", name, value);
        }
    }
    if composer.fps == 0 {
        anyhow::bail!("composer.fps must be at least 1");
    }
    if !(composer.scene_seconds > 0.0) {
        anyhow::bail!("composer.scene_seconds must be positive");
    }
    if composer.timeout_secs == 0 || composer.ffmpeg_timeout_secs == 0 {
        anyhow::bail!("composer timeouts must be at least 1 second");
    }
    if composer.captions && composer.caption_font_size == 0 {
        anyhow::bail!("composer.caption_font_size must be at least 1");
    }
    if composer.backend == ComposerBackend::Creatomate && composer.template_id.trim().is_empty() {
        anyhow::bail!("composer.template_id is required for the creatomate backend");
    }

    if config.queue.backend == QueueBackend::Sheets && config.queue.sheet_name.trim().is_empty() {
        anyhow::bail!("queue.sheet_name cannot be empty");
    }

    if !matches!(
        config.publisher.privacy_status.as_str(),
        "public" | "unlisted" | "private"
    ) {
        anyhow::bail!(
            "publisher.privacy_status must be public, unlisted or private, got '{}'",
            config.publisher.privacy_status
        );
    }

    if let Some(template) = &config.generator.prompt_template {
        if !template.contains("{topic}") {
            anyhow::bail!("generator.prompt_template must contain {{topic}}");
        }
    }

    Ok(())
}
