//! Google Drive v3 files client.
//!
//! Used to put narration audio somewhere a remote renderer can download it:
//! the file is uploaded, named, optionally filed into a folder and shared
//! with anyone holding the link.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;

use crate::error::ProviderError;
use crate::google::auth::AccessTokenProvider;
use crate::http::check_status;
use crate::providers::AssetHost;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub web_content_link: Option<String>,
}

pub struct DriveClient {
    client: Client,
    base_url: String,
    folder_id: Option<String>,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl DriveClient {
    pub fn new(
        client: Client,
        base_url: &str,
        folder_id: Option<String>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            folder_id: folder_id.filter(|f| !f.trim().is_empty()),
            tokens,
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::local(format!("invalid drive base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::local("drive base url cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Upload the bytes of `path` as a new untitled file and return its id.
    pub async fn upload(&self, path: &Path, mime: &str) -> Result<String, ProviderError> {
        let bytes = tokio::fs::read(path).await?;
        if bytes.is_empty() {
            return Err(ProviderError::local(format!("{} is empty", path.display())));
        }

        let mut url = self.url(&["upload", "drive", "v3", "files"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("fields", "id");
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, mime)
            .body(bytes)
            .send()
            .await?;
        let file: DriveFile = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::invalid(format!("drive upload: {}", e)))?;
        Ok(file.id)
    }

    /// Set the file's name and move it into the configured folder.
    pub async fn describe(&self, id: &str, name: &str) -> Result<DriveFile, ProviderError> {
        let mut url = self.url(&["drive", "v3", "files", id])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("fields", "id,webContentLink");
            if let Some(folder) = &self.folder_id {
                query.append_pair("addParents", folder);
            }
        }
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .patch(url)
            .bearer_auth(token)
            .json(&json!({ "name": name }))
            .send()
            .await?;
        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::invalid(format!("drive file metadata: {}", e)))
    }

    /// Let anyone with the link read the file.
    pub async fn share_publicly(&self, id: &str) -> Result<(), ProviderError> {
        let url = self.url(&["drive", "v3", "files", id, "permissions"])?;
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Direct-download link for a shared file.
pub fn download_link(id: &str) -> String {
    format!("https://drive.google.com/uc?export=download&id={}", id)
}

#[async_trait]
impl AssetHost for DriveClient {
    async fn host(&self, path: &Path, name: &str, mime: &str) -> Result<String, ProviderError> {
        let id = self.upload(path, mime).await?;
        let file = self.describe(&id, name).await?;
        self.share_publicly(&id).await?;
        tracing::debug!(file_id = %id, name, "Shared file on Drive");
        Ok(file
            .web_content_link
            .unwrap_or_else(|| download_link(&id)))
    }
}
