//! ElevenLabs text-to-speech client.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{write_asset, SpeechSynthesizer};
use crate::config::VoiceConfig;
use crate::credentials::Secret;
use crate::error::ProviderError;
use crate::http::check_status;

pub struct ElevenLabsSynthesizer {
    client: Client,
    base_url: String,
    api_key: Secret,
    voice_id: String,
    model_id: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(client: Client, api_key: Secret, config: &VoiceConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            voice_id: config.voice_id.clone(),
            model_id: config.model_id.clone(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str, output: &Path) -> Result<PathBuf, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::invalid("nothing to synthesize"));
        }

        let url = format!("{}/v1/text-to-speech/{}", self.base_url, self.voice_id);
        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose())
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&json!({ "text": text, "model_id": self.model_id }))
            .send()
            .await?;
        let bytes = check_status(response).await?.bytes().await?;

        write_asset(output, &bytes, "audio").await?;
        tracing::debug!(path = %output.display(), bytes = bytes.len(), "Saved narration");
        Ok(output.to_path_buf())
    }
}
