//! YouTube Data API resumable upload.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use reelforge_common::QueueItem;
use reqwest::header::{HeaderMap, CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::VideoPublisher;
use crate::config::PublisherConfig;
use crate::error::ProviderError;
use crate::google::AccessTokenProvider;
use crate::http::check_status;

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;

#[derive(Debug, Deserialize)]
struct UploadedVideo {
    id: String,
}

/// What an interrupted upload session reports about itself.
#[derive(Debug, PartialEq, Eq)]
enum SessionState {
    Complete(String),
    /// Offset of the first byte the server does not have.
    Incomplete(usize),
    Gone,
}

/// Resumable uploads, one session per queue item.
///
/// A session survives a transient failure so the next attempt resumes it
/// instead of uploading the video a second time.
pub struct YouTubePublisher {
    client: Client,
    config: PublisherConfig,
    tokens: Arc<dyn AccessTokenProvider>,
    sessions: Mutex<HashMap<String, String>>,
}

impl YouTubePublisher {
    /// `client` should carry the upload timeout rather than the API one.
    pub fn new(client: Client, config: &PublisherConfig, tokens: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            client,
            config: config.clone(),
            tokens,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// `snippet` and `status` parts for an item.
    pub fn metadata(&self, item: &QueueItem) -> Value {
        json!({
            "snippet": {
                "title": video_title(&item.topic),
                "description": video_description(item),
                "tags": video_tags(&self.config.default_tags, item.hashtags.as_deref()),
                "categoryId": self.config.category_id,
            },
            "status": {
                "privacyStatus": self.config.privacy_status,
                "selfDeclaredMadeForKids": false,
            },
        })
    }

    async fn start_session(&self, token: &str, metadata: &Value, length: usize) -> Result<String, ProviderError> {
        let url = format!(
            "{}/upload/youtube/v3/videos",
            self.config.upload_base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(token)
            .header("X-Upload-Content-Type", "video/mp4")
            .header("X-Upload-Content-Length", length.to_string())
            .json(metadata)
            .send()
            .await?;
        let response = check_status(response).await?;

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::invalid("upload session has no Location header"))
    }

    /// Ask an open session how much of the file it has.
    async fn session_state(&self, token: &str, session: &str, total: usize) -> Result<SessionState, ProviderError> {
        let response = self
            .client
            .put(session)
            .bearer_auth(token)
            .header(CONTENT_RANGE, format!("bytes */{}", total))
            .body(Vec::new())
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(SessionState::Complete(uploaded_id(response).await?)),
            StatusCode::PERMANENT_REDIRECT => Ok(SessionState::Incomplete(next_offset(response.headers()))),
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(SessionState::Gone),
            status => {
                check_status(response).await?;
                Err(ProviderError::invalid(format!("unexpected upload session status {}", status)))
            }
        }
    }

    /// Send `bytes[offset..]` to the session.
    async fn send_from(&self, token: &str, session: &str, bytes: &[u8], offset: usize) -> Result<String, ProviderError> {
        let total = bytes.len();
        if offset >= total {
            return Err(ProviderError::invalid("upload session holds the whole file but reports no video"));
        }
        let response = self
            .client
            .put(session)
            .bearer_auth(token)
            .header(CONTENT_TYPE, "video/mp4")
            .header(CONTENT_RANGE, format!("bytes {}-{}/{}", offset, total - 1, total))
            .body(bytes[offset..].to_vec())
            .send()
            .await?;

        if response.status() == StatusCode::PERMANENT_REDIRECT {
            return Err(ProviderError::Transport(format!(
                "upload stopped after byte {} of {}",
                next_offset(response.headers()),
                total
            )));
        }
        uploaded_id(check_status(response).await?).await
    }

    async fn upload(&self, key: &str, item: &QueueItem, bytes: &[u8]) -> Result<String, ProviderError> {
        let token = self.tokens.access_token().await?;

        let existing = self.sessions.lock().get(key).cloned();
        let mut resume = None;
        if let Some(session) = existing {
            match self.session_state(&token, &session, bytes.len()).await? {
                SessionState::Complete(id) => {
                    tracing::info!(item_id = %item.id, video_id = %id, "Earlier upload attempt had completed");
                    return Ok(id);
                }
                SessionState::Incomplete(offset) => {
                    tracing::info!(item_id = %item.id, offset, "Resuming upload");
                    resume = Some((session, offset));
                }
                SessionState::Gone => {
                    tracing::warn!(item_id = %item.id, "Upload session expired, starting over");
                }
            }
        }

        let (session, offset) = match resume {
            Some(resume) => resume,
            None => {
                let metadata = self.metadata(item);
                let session = self.start_session(&token, &metadata, bytes.len()).await?;
                self.sessions.lock().insert(key.to_string(), session.clone());
                tracing::debug!(item_id = %item.id, bytes = bytes.len(), "Upload session opened");
                (session, 0)
            }
        };

        self.send_from(&token, &session, bytes, offset).await
    }
}

#[async_trait]
impl VideoPublisher for YouTubePublisher {
    async fn publish(&self, video: &Path, item: &QueueItem) -> Result<String, ProviderError> {
        let bytes = tokio::fs::read(video).await?;
        if bytes.is_empty() {
            return Err(ProviderError::local(format!("{} is empty", video.display())));
        }

        let key = item.id.to_string();
        let result = self.upload(&key, item, &bytes).await;
        match &result {
            Err(e) if e.is_transient() => {}
            _ => {
                self.sessions.lock().remove(&key);
            }
        }

        let video_id = result?;
        tracing::info!(item_id = %item.id, video_id = %video_id, "Video uploaded");
        Ok(video_id)
    }
}

async fn uploaded_id(response: Response) -> Result<String, ProviderError> {
    let uploaded: UploadedVideo = response
        .json()
        .await
        .map_err(|e| ProviderError::invalid(format!("upload response: {}", e)))?;
    Ok(uploaded.id)
}

/// First missing byte from a `Range: bytes=0-K` header; 0 when absent.
fn next_offset(headers: &HeaderMap) -> usize {
    headers
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().strip_prefix("bytes="))
        .and_then(|v| v.split_once('-'))
        .and_then(|(_, end)| end.trim().parse::<usize>().ok())
        .map(|end| end + 1)
        .unwrap_or(0)
}

fn clean(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '<' | '>')).collect::<String>().trim().to_string()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect::<String>().trim_end().to_string()
}

/// `"POV: <topic>"`, without doubling an existing prefix.
pub fn video_title(topic: &str) -> String {
    let topic = clean(topic);
    let has_prefix = topic
        .get(..4)
        .map(|p| p.eq_ignore_ascii_case("pov:"))
        .unwrap_or(false);
    let title = if has_prefix {
        topic
    } else {
        format!("POV: {}", topic)
    };
    truncate_chars(&title, MAX_TITLE_CHARS)
}

pub fn video_description(item: &QueueItem) -> String {
    let parts: Vec<String> = [Some(item.topic.as_str()), item.caption.as_deref(), item.hashtags.as_deref()]
        .into_iter()
        .flatten()
        .map(clean)
        .filter(|s| !s.is_empty())
        .collect();
    truncate_chars(&parts.join("\n\n"), MAX_DESCRIPTION_CHARS)
}

/// Configured tags followed by the item's hashtags, without `#`, deduplicated
/// case-insensitively.
pub fn video_tags(defaults: &[String], hashtags: Option<&str>) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let candidates = defaults
        .iter()
        .map(|t| t.trim().to_string())
        .chain(
            hashtags
                .unwrap_or("")
                .split_whitespace()
                .map(|t| t.trim_start_matches('#').trim_end_matches(',').to_string()),
        );
    for tag in candidates {
        if !tag.is_empty() && !tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
            tags.push(tag);
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_common::ItemId;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_next_offset_from_range() {
        let mut headers = HeaderMap::new();
        assert_eq!(next_offset(&headers), 0);
        headers.insert(RANGE, HeaderValue::from_static("bytes=0-524287"));
        assert_eq!(next_offset(&headers), 524288);
        headers.insert(RANGE, HeaderValue::from_static("garbage"));
        assert_eq!(next_offset(&headers), 0);
    }

    #[test]
    fn test_title_prefix_and_length() {
        assert_eq!(video_title("You are a scribe"), "POV: You are a scribe");
        assert_eq!(video_title("POV: You are a scribe"), "POV: You are a scribe");
        assert_eq!(video_title("pov: <b>bold</b>"), "pov: bbold/b");
        assert_eq!(video_title(&"x".repeat(300)).chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_tags() {
        let defaults = vec!["Ancient Egypt".to_string(), "POV".to_string()];
        assert_eq!(
            video_tags(&defaults, Some("#POV #Pharaoh, #AncientEgypt")),
            vec!["Ancient Egypt", "POV", "Pharaoh", "AncientEgypt"]
        );
        assert_eq!(video_tags(&defaults, None), vec!["Ancient Egypt", "POV"]);
    }

    #[test]
    fn test_metadata() {
        let publisher = YouTubePublisher::new(
            Client::new(),
            &PublisherConfig::default(),
            Arc::new(crate::google::StaticToken("t".into())),
        );
        let mut item = QueueItem::new_pending(ItemId::new("3"), "POV: You guard the tomb");
        item.caption = Some("Silence in the dark".into());
        item.hashtags = Some("#Tomb".into());

        let meta = publisher.metadata(&item);
        assert_eq!(meta["snippet"]["title"], "POV: You guard the tomb");
        assert_eq!(
            meta["snippet"]["description"],
            "POV: You guard the tomb\n\nSilence in the dark\n\n#Tomb"
        );
        assert_eq!(meta["snippet"]["categoryId"], "22");
        assert_eq!(meta["status"]["privacyStatus"], "public");
        assert_eq!(meta["status"]["selfDeclaredMadeForKids"], false);
    }
}
