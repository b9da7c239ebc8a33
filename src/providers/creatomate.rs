//! Remote composition through the Creatomate render API.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{write_asset, CompositionJob, VideoComposer};
use crate::config::ComposerConfig;
use crate::credentials::Secret;
use crate::error::ProviderError;
use crate::http::check_status;

#[derive(Debug, Clone, Deserialize)]
struct Render {
    id: String,
    status: String,
    url: Option<String>,
    error_message: Option<String>,
}

/// The create endpoint answers with one render or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CreateResponse {
    Many(Vec<Render>),
    One(Render),
}

pub struct CreatomateComposer {
    client: Client,
    base_url: String,
    api_key: Secret,
    template_id: String,
    poll_interval: Duration,
}

impl CreatomateComposer {
    pub fn new(client: Client, api_key: Secret, config: &ComposerConfig) -> Self {
        Self {
            client,
            base_url: config.creatomate_base_url.trim_end_matches('/').to_string(),
            api_key,
            template_id: config.template_id.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }
    }

    async fn create(&self, modifications: Map<String, Value>) -> Result<Render, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v1/renders", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&json!({
                "template_id": self.template_id,
                "modifications": modifications,
            }))
            .send()
            .await?;
        let created: CreateResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::invalid(format!("render response: {}", e)))?;

        match created {
            CreateResponse::One(render) => Ok(render),
            CreateResponse::Many(renders) => renders
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::invalid("no render was created")),
        }
    }

    async fn status(&self, id: &str) -> Result<Render, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/renders/{}", self.base_url, id))
            .bearer_auth(self.api_key.expose())
            .send()
            .await?;
        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::invalid(format!("render status: {}", e)))
    }
}

/// Template modifications for the scenes of a job.
pub fn modifications(job: &CompositionJob) -> Result<Map<String, Value>, ProviderError> {
    let mut mods = Map::new();
    for (index, scene) in job.scenes.iter().enumerate() {
        let n = index + 1;
        let image_url = scene.image.url.as_ref().ok_or_else(|| {
            ProviderError::local(format!("scene {} image has no remote URL", n))
        })?;
        let audio_url = scene.audio_url.as_ref().ok_or_else(|| {
            ProviderError::local(format!("scene {} narration has no remote URL", n))
        })?;
        mods.insert(format!("Image-{}.source", n), json!(image_url));
        mods.insert(format!("Text-{}.text", n), json!(scene.narration));
        mods.insert(format!("Audio-{}.source", n), json!(audio_url));
    }
    Ok(mods)
}

#[async_trait]
impl VideoComposer for CreatomateComposer {
    async fn compose(&self, job: &CompositionJob) -> Result<PathBuf, ProviderError> {
        let mut render = self.create(modifications(job)?).await?;
        tracing::info!(item_id = %job.item_id, render_id = %render.id, "Submitted render");

        loop {
            match render.status.as_str() {
                "succeeded" => break,
                "failed" => {
                    return Err(ProviderError::invalid(format!(
                        "render failed: {}",
                        render.error_message.as_deref().unwrap_or("no reason given")
                    )))
                }
                status => {
                    tracing::debug!(render_id = %render.id, status, "Render not finished");
                    tokio::time::sleep(self.poll_interval).await;
                    render = self.status(&render.id).await?;
                }
            }
        }

        let url = render
            .url
            .ok_or_else(|| ProviderError::invalid("finished render has no url"))?;
        let response = self.client.get(&url).send().await?;
        let bytes = check_status(response).await?.bytes().await?;
        write_asset(&job.output, &bytes, "video").await?;

        tracing::info!(item_id = %job.item_id, path = %job.output.display(), "Downloaded render");
        Ok(job.output.clone())
    }
}
