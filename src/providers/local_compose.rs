//! Composition with the local ffmpeg install.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reelforge_av::{CaptionStyle, Ffmpeg, RenderSettings};

use super::{CompositionJob, VideoComposer};
use crate::config::{ComposerConfig, ToolsConfig};
use crate::error::ProviderError;

/// Renders one zooming, captioned clip per scene and joins them.
///
/// The binaries are resolved on every job, so a missing ffmpeg fails the
/// item instead of the whole run.
pub struct LocalComposer {
    settings: RenderSettings,
    ffmpeg_path: Option<PathBuf>,
    ffprobe_path: Option<PathBuf>,
    tool_timeout: Duration,
    fallback_duration: Duration,
}

impl LocalComposer {
    pub fn new(config: &ComposerConfig, tools: &ToolsConfig) -> Self {
        Self {
            settings: RenderSettings {
                width: config.width,
                height: config.height,
                fps: config.fps,
                zoom_step: config.zoom_step,
                caption: config.captions.then(|| CaptionStyle {
                    font_size: config.caption_font_size,
                    font_file: config.font_file.clone(),
                }),
                ..RenderSettings::default()
            },
            ffmpeg_path: tools.ffmpeg_path.clone(),
            ffprobe_path: tools.ffprobe_path.clone(),
            tool_timeout: Duration::from_secs(config.ffmpeg_timeout_secs),
            fallback_duration: Duration::from_secs_f64(config.scene_seconds),
        }
    }
}

#[async_trait]
impl VideoComposer for LocalComposer {
    async fn compose(&self, job: &CompositionJob) -> Result<PathBuf, ProviderError> {
        if job.scenes.is_empty() {
            return Err(ProviderError::local("no scenes to compose"));
        }

        let ff = Ffmpeg::locate(
            self.ffmpeg_path.as_deref(),
            self.ffprobe_path.as_deref(),
            self.tool_timeout,
        )?;

        let mut clips = Vec::with_capacity(job.scenes.len());
        for (index, scene) in job.scenes.iter().enumerate() {
            let duration = match ff.probe_duration(&scene.audio).await {
                Ok(d) if !d.is_zero() => d,
                Err(e @ reelforge_av::Error::Timeout { .. }) => return Err(e.into()),
                measured => {
                    let cause = match measured {
                        Err(e) => e.to_string(),
                        Ok(_) => "zero duration".to_string(),
                    };
                    tracing::warn!(
                        item_id = %job.item_id,
                        scene = index + 1,
                        "Could not measure narration ({}), using {:.1}s",
                        cause,
                        self.fallback_duration.as_secs_f64()
                    );
                    self.fallback_duration
                }
            };

            if let Some(parent) = scene.clip.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            ff.render_scene(
                &scene.image.path,
                Some(&scene.audio),
                Some(&scene.narration),
                duration,
                &self.settings,
                &scene.clip,
            )
            .await?;
            tracing::debug!(
                item_id = %job.item_id,
                scene = index + 1,
                secs = duration.as_secs_f64(),
                "Rendered clip"
            );
            clips.push(scene.clip.clone());
        }

        ff.concat(&clips, &job.output).await?;
        Ok(job.output.clone())
    }
}
