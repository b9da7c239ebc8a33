//! Per-item state machine: claim, generate, synthesize, compose, publish.

use std::path::PathBuf;
use std::time::Instant;

use reelforge_common::{ItemId, ItemStatus, ItemUpdate, QueueItem};
use tracing::Instrument;

use super::report::ItemOutcome;
use super::PipelineContext;
use crate::error::{ItemError, ProviderError};
use crate::providers::{CompositionJob, SceneAssets, Script};
use crate::retry::with_backoff;

/// Stages an item moves through once claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Generating,
    Synthesizing,
    Composing,
    Publishing,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generating => "generating",
            Self::Synthesizing => "synthesizing",
            Self::Composing => "composing",
            Self::Publishing => "publishing",
        }
    }
}

/// Why an item stopped before publishing finished.
#[derive(Debug)]
struct Failure {
    error: ItemError,
    /// The stored item no longer belongs to this run and must not be written.
    lost_claim: bool,
}

impl From<ItemError> for Failure {
    fn from(error: ItemError) -> Self {
        Self {
            error,
            lost_claim: false,
        }
    }
}

struct Published {
    video_id: String,
    script: String,
    audio_dir: PathBuf,
    video: PathBuf,
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Drive one selected item to `done` or `failed`.
///
/// Every outcome is returned rather than raised so the rest of the batch
/// keeps going.
pub async fn process_item(ctx: &PipelineContext, item: QueueItem) -> ItemOutcome {
    let span = tracing::info_span!("item", item_id = %item.id);
    run_item(ctx, item).instrument(span).await
}

async fn run_item(ctx: &PipelineContext, item: QueueItem) -> ItemOutcome {
    let started = Instant::now();
    let id = item.id.clone();

    let claim = ItemUpdate {
        clear_error: item.status == ItemStatus::Failed,
        ..ItemUpdate::default()
    };
    let claimed = match ctx
        .queue
        .transition(&id, item.status, ItemStatus::InProgress, claim)
        .await
    {
        Ok(claimed) => claimed,
        Err(e) if e.is_conflict() => {
            tracing::info!("Item was claimed or changed by someone else, skipping");
            return ItemOutcome::skipped(id, e.to_string());
        }
        Err(e) => {
            tracing::error!("Failed to claim item: {}", e);
            return ItemOutcome::failed(id, format!("QueueUnavailable: {}", e), elapsed_ms(started))
                .with_queue_error(e.to_string());
        }
    };
    tracing::info!("Claimed: {}", claimed.topic);

    match produce(ctx, &claimed).await {
        Ok(published) => record_done(ctx, &id, published, started).await,
        Err(failure) => record_failed(ctx, &id, failure, started).await,
    }
}

async fn record_done(ctx: &PipelineContext, id: &ItemId, published: Published, started: Instant) -> ItemOutcome {
    let update = ItemUpdate {
        script: Some(published.script),
        audio_path: Some(published.audio_dir.display().to_string()),
        video_path: Some(published.video.display().to_string()),
        ..ItemUpdate::published(published.video_id.clone())
    };

    match ctx
        .queue
        .transition(id, ItemStatus::InProgress, ItemStatus::Done, update)
        .await
    {
        Ok(_) => {
            tracing::info!(video_id = %published.video_id, "Done");
            ItemOutcome::done(id.clone(), published.video_id, elapsed_ms(started))
        }
        Err(e) if e.is_conflict() => {
            let error = ItemError::Publish(format!(
                "item changed while publishing; uploaded video {} was not recorded",
                published.video_id
            ));
            tracing::error!("{}", error);
            ItemOutcome::failed(id.clone(), error.to_string(), elapsed_ms(started))
        }
        Err(e) => {
            tracing::error!(
                video_id = %published.video_id,
                "Published but failed to record the result: {}",
                e
            );
            let mut outcome = ItemOutcome::done(id.clone(), published.video_id, elapsed_ms(started));
            outcome.queue_error = Some(e.to_string());
            outcome
        }
    }
}

async fn record_failed(ctx: &PipelineContext, id: &ItemId, failure: Failure, started: Instant) -> ItemOutcome {
    let message = failure.error.to_string();
    tracing::error!("Failed: {}", message);
    let outcome = ItemOutcome::failed(id.clone(), message.clone(), elapsed_ms(started));

    if failure.lost_claim {
        return outcome;
    }
    match ctx
        .queue
        .transition(id, ItemStatus::InProgress, ItemStatus::Failed, ItemUpdate::failed(message))
        .await
    {
        Ok(_) => outcome,
        Err(e) => {
            tracing::error!("Failed to record failure: {}", e);
            outcome.with_queue_error(e.to_string())
        }
    }
}

fn log_phase(phase: Phase, step: usize) {
    tracing::info!(phase = phase.as_str(), "[{}/4] {}", step, phase.as_str());
}

async fn produce(ctx: &PipelineContext, item: &QueueItem) -> Result<Published, Failure> {
    let providers = &ctx.providers;
    let retry = &ctx.retry;

    log_phase(Phase::Generating, 1);
    let script: Script = with_backoff(retry, "script", || providers.scripts.generate_script(item))
        .await
        .map_err(|e| ItemError::Generation(e.to_string()))?;
    tracing::debug!(scenes = script.scenes.len(), "Script ready");

    ctx.scratch
        .ensure_item(&item.id)
        .map_err(|e| ItemError::Generation(e.to_string()))?;

    let mut images = Vec::with_capacity(script.scenes.len());
    for (index, scene) in script.scenes.iter().enumerate() {
        let path = ctx.scratch.scene_image(&item.id, index + 1);
        let image = with_backoff(retry, "image", || {
            providers.images.generate_image(&scene.image_prompt, &path)
        })
        .await
        .map_err(|e| ItemError::Generation(format!("scene {} image: {}", index + 1, e)))?;
        images.push(image);
    }

    log_phase(Phase::Synthesizing, 2);
    let mut scenes = Vec::with_capacity(script.scenes.len());
    for (index, (scene, image)) in script.scenes.iter().zip(images).enumerate() {
        let path = ctx.scratch.scene_audio(&item.id, index + 1);
        let audio = with_backoff(retry, "speech", || {
            providers.voice.synthesize(&scene.narration, &path)
        })
        .await
        .map_err(|e| ItemError::Synthesis(format!("scene {}: {}", index + 1, e)))?;

        let audio_url = match &providers.audio_host {
            Some(host) => {
                let name = format!("{}_scene_{:03}.mp3", item.id, index + 1);
                let url = with_backoff(retry, "audio upload", || {
                    host.host(&audio, &name, "audio/mpeg")
                })
                .await
                .map_err(|e| {
                    ItemError::Synthesis(format!("scene {} audio upload: {}", index + 1, e))
                })?;
                tracing::debug!(scene = index + 1, %url, "Narration hosted");
                Some(url)
            }
            None => None,
        };
        scenes.push(SceneAssets {
            narration: scene.narration.clone(),
            image,
            audio,
            audio_url,
            clip: ctx.scratch.scene_clip(&item.id, index + 1),
        });
    }

    log_phase(Phase::Composing, 3);
    let job = CompositionJob {
        item_id: item.id.clone(),
        scenes,
        output: ctx.scratch.final_video(&item.id),
    };
    let compose = with_backoff(retry, "compose", || providers.composer.compose(&job));
    let video = match tokio::time::timeout(ctx.compose_timeout, compose).await {
        Ok(Ok(video)) => video,
        Ok(Err(ProviderError::Timeout(reason))) => {
            tracing::warn!("Composition timed out: {}", reason);
            return Err(ItemError::composition_timeout().into());
        }
        Ok(Err(e)) => return Err(ItemError::Composition(e.to_string()).into()),
        Err(_) => {
            tracing::warn!(
                timeout_secs = ctx.compose_timeout.as_secs(),
                "Composition timed out"
            );
            return Err(ItemError::composition_timeout().into());
        }
    };

    log_phase(Phase::Publishing, 4);
    let current = ctx.queue.get(&item.id).await.map_err(|e| {
        ItemError::Publish(format!("cannot confirm item status before upload: {}", e))
    })?;
    if current.status != ItemStatus::InProgress {
        return Err(Failure {
            error: ItemError::Publish(format!(
                "item is now '{}', not uploading",
                current.status
            )),
            lost_claim: true,
        });
    }

    let video_id = with_backoff(retry, "upload", || providers.publisher.publish(&video, item))
        .await
        .map_err(|e| ItemError::Publish(e.to_string()))?;

    Ok(Published {
        video_id,
        script: script.narration(),
        audio_dir: ctx.scratch.audio_dir(&item.id),
        video,
    })
}
