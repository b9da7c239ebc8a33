//! External services behind the pipeline stages.
//!
//! Each stage is a trait so runs can be driven by stub implementations in
//! tests. Every call returns [`ProviderError`]; the pipeline decides which
//! stage error it becomes.

pub mod creatomate;
pub mod elevenlabs;
pub mod gemini;
pub mod local_compose;
pub mod pollinations;
pub mod prompt;
pub mod youtube;

pub use creatomate::CreatomateComposer;
pub use elevenlabs::ElevenLabsSynthesizer;
pub use gemini::GeminiClient;
pub use local_compose::LocalComposer;
pub use pollinations::PollinationsImages;
pub use youtube::YouTubePublisher;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reelforge_common::{ItemId, QueueItem};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// One narrated still.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub narration: String,
    #[serde(default)]
    pub image_prompt: String,
}

/// Generated narration and image prompts for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub title: String,
    pub scenes: Vec<Scene>,
}

impl Script {
    /// Full narration, scene texts joined with single spaces.
    pub fn narration(&self) -> String {
        self.scenes
            .iter()
            .map(|s| s.narration.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// An image written to scratch, with the URL it was fetched from.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub path: PathBuf,
    pub url: Option<String>,
}

/// Everything the composer needs for one scene.
#[derive(Debug, Clone)]
pub struct SceneAssets {
    pub narration: String,
    pub image: GeneratedImage,
    pub audio: PathBuf,
    /// Remote copy of the audio, for composers that fetch assets by URL.
    pub audio_url: Option<String>,
    /// Where a locally rendered clip for this scene goes.
    pub clip: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CompositionJob {
    pub item_id: ItemId,
    pub scenes: Vec<SceneAssets>,
    pub output: PathBuf,
}

#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate_script(&self, item: &QueueItem) -> Result<Script, ProviderError>;
}

#[async_trait]
pub trait IdeaGenerator: Send + Sync {
    /// Raw tab-separated idea rows, one per line.
    async fn generate_ideas(&self, count: usize) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &str, output: &Path) -> Result<GeneratedImage, ProviderError>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Write speech for `text` to `output` and return its path.
    async fn synthesize(&self, text: &str, output: &Path) -> Result<PathBuf, ProviderError>;
}

#[async_trait]
pub trait VideoComposer: Send + Sync {
    /// Render the final video and return its path.
    async fn compose(&self, job: &CompositionJob) -> Result<PathBuf, ProviderError>;
}

#[async_trait]
pub trait VideoPublisher: Send + Sync {
    /// Upload and return the platform's video id.
    async fn publish(&self, video: &Path, item: &QueueItem) -> Result<String, ProviderError>;
}

/// Somewhere a local file can be put so a remote service can fetch it.
#[async_trait]
pub trait AssetHost: Send + Sync {
    /// Upload `path` under `name` and return a publicly readable URL.
    async fn host(&self, path: &Path, name: &str, mime: &str) -> Result<String, ProviderError>;
}

/// Write a response body to `path`, refusing empty payloads.
pub(crate) async fn write_asset(path: &Path, bytes: &[u8], what: &str) -> Result<(), ProviderError> {
    if bytes.is_empty() {
        return Err(ProviderError::invalid(format!("empty {} body", what)));
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
