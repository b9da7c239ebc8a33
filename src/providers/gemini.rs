//! Gemini `generateContent` client for scripts and ideas.

use async_trait::async_trait;
use reelforge_common::QueueItem;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;

use super::prompt::{PromptContext, IDEAS_PROMPT, SCRIPT_PROMPT};
use super::{IdeaGenerator, Script, ScriptGenerator};
use crate::config::{GeneratorConfig, IdeasConfig};
use crate::credentials::Secret;
use crate::error::ProviderError;
use crate::http::check_status;

/// Image prompts longer than this are cut; the image service rejects
/// very long URLs.
pub const MAX_IMAGE_PROMPT_CHARS: usize = 450;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: Secret,
    config: GeneratorConfig,
    default_environment: String,
}

impl GeminiClient {
    pub fn new(client: Client, api_key: Secret, config: &GeneratorConfig, ideas: &IdeasConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            config: config.clone(),
            default_environment: ideas.default_environment.clone(),
        }
    }

    fn endpoint(&self) -> Result<Url, ProviderError> {
        let method = format!("{}:generateContent", self.config.model);
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::local(format!("invalid gemini base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::local("gemini base url cannot be a base"))?
            .pop_if_empty()
            .extend(["v1beta", "models", method.as_str()]);
        Ok(url)
    }

    /// Send one prompt and return the concatenated text parts.
    async fn generate(&self, prompt: &str, json_output: bool) -> Result<String, ProviderError> {
        let mut generation = json!({ "temperature": self.config.temperature });
        if json_output {
            generation["responseMimeType"] = json!("application/json");
        }
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": generation,
        });

        let response = self
            .client
            .post(self.endpoint()?)
            .header("x-goog-api-key", self.api_key.expose())
            .json(&body)
            .send()
            .await?;
        let response: GenerateResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::invalid(format!("gemini response: {}", e)))?;

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::invalid("gemini returned no candidates"))?;
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::invalid(format!(
                "gemini returned no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }

    fn script_prompt(&self, item: &QueueItem) -> String {
        let template = self.config.prompt_template.as_deref().unwrap_or(SCRIPT_PROMPT);
        PromptContext::new()
            .with_var("topic", item.topic.as_str())
            .with_var(
                "environment",
                item.environment
                    .clone()
                    .unwrap_or_else(|| self.default_environment.clone()),
            )
            .with_var("scene_count", self.config.scenes_per_video.to_string())
            .with_var("theme", self.config.theme.as_str())
            .render(template)
    }
}

#[async_trait]
impl ScriptGenerator for GeminiClient {
    async fn generate_script(&self, item: &QueueItem) -> Result<Script, ProviderError> {
        let prompt = self.script_prompt(item);
        tracing::debug!(item_id = %item.id, model = %self.config.model, "Requesting script");
        let text = self.generate(&prompt, true).await?;
        parse_script(&text, self.config.scenes_per_video)
    }
}

#[async_trait]
impl IdeaGenerator for GeminiClient {
    async fn generate_ideas(&self, count: usize) -> Result<String, ProviderError> {
        let prompt = PromptContext::new()
            .with_var("count", count.to_string())
            .with_var("theme", self.config.theme.as_str())
            .render(IDEAS_PROMPT);
        self.generate(&prompt, false).await
    }
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if let Ok(re) = regex::Regex::new(r"(?s)^```[A-Za-z0-9_-]*\s*\n?(.*?)\s*```$") {
        if let Some(inner) = re.captures(trimmed).and_then(|c| c.get(1)) {
            return inner.as_str();
        }
    }
    trimmed
}

/// Parse the model's JSON into a script of at most `max_scenes` scenes.
pub fn parse_script(text: &str, max_scenes: usize) -> Result<Script, ProviderError> {
    let mut script: Script = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| ProviderError::invalid(format!("script is not valid JSON: {}", e)))?;

    if script.scenes.is_empty() {
        return Err(ProviderError::invalid("script has no scenes"));
    }
    if script.scenes.len() > max_scenes {
        tracing::debug!(
            scenes = script.scenes.len(),
            max_scenes,
            "Dropping surplus scenes"
        );
        script.scenes.truncate(max_scenes);
    }

    for (index, scene) in script.scenes.iter_mut().enumerate() {
        scene.narration = scene.narration.trim().to_string();
        if scene.narration.is_empty() {
            return Err(ProviderError::invalid(format!(
                "scene {} has no narration",
                index + 1
            )));
        }

        let prompt = scene.image_prompt.trim().replace('"', "");
        let prompt = if prompt.is_empty() { scene.narration.clone() } else { prompt };
        scene.image_prompt = prompt.chars().take(MAX_IMAGE_PROMPT_CHARS).collect();
    }

    Ok(script)
}
