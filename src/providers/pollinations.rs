//! Pollinations text-to-image client.

use std::num::NonZeroU32;
use std::path::Path;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, Url};

use super::{write_asset, GeneratedImage, ImageGenerator};
use crate::config::ImagesConfig;
use crate::error::ProviderError;
use crate::http::check_status;

pub struct PollinationsImages {
    client: Client,
    config: ImagesConfig,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl PollinationsImages {
    pub fn new(client: Client, config: &ImagesConfig) -> Self {
        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            client,
            config: config.clone(),
            rate_limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        }
    }

    /// `GET {base}/prompt/{prompt}?width&height&model&seed&nologo=true`
    pub fn image_url(&self, prompt: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(self.config.base_url.trim_end_matches('/'))
            .map_err(|e| ProviderError::local(format!("invalid image base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::local("image base url cannot be a base"))?
            .pop_if_empty()
            .extend(["prompt", prompt]);
        url.query_pairs_mut()
            .append_pair("width", &self.config.width.to_string())
            .append_pair("height", &self.config.height.to_string())
            .append_pair("model", &self.config.model)
            .append_pair("seed", &self.config.seed.to_string())
            .append_pair("nologo", "true");
        Ok(url)
    }
}

#[async_trait]
impl ImageGenerator for PollinationsImages {
    async fn generate_image(&self, prompt: &str, output: &Path) -> Result<GeneratedImage, ProviderError> {
        let url = self.image_url(prompt)?;
        self.rate_limiter.until_ready().await;

        let response = self.client.get(url.clone()).send().await?;
        let response = check_status(response).await?;

        if let Some(kind) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !kind.starts_with("image/") {
                return Err(ProviderError::invalid(format!(
                    "expected an image, got {}",
                    kind
                )));
            }
        }

        let bytes = response.bytes().await?;
        write_asset(output, &bytes, "image").await?;
        tracing::debug!(path = %output.display(), bytes = bytes.len(), "Saved image");

        Ok(GeneratedImage {
            path: output.to_path_buf(),
            url: Some(url.to_string()),
        })
    }
}
