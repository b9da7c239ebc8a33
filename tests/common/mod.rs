//! Shared test harness for integration tests.
//!
//! Provides [`StubStudio`], one stub that stands in for every external
//! service, and [`Harness`], which wires it to an in-memory SQLite queue and
//! a temporary scratch directory.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reelforge::config::IdeasConfig;
use reelforge::error::ProviderError;
use reelforge::pipeline::{PipelineContext, Providers};
use reelforge::providers::{
    AssetHost, CompositionJob, GeneratedImage, IdeaGenerator, ImageGenerator, Scene, Script,
    ScriptGenerator, SpeechSynthesizer, VideoComposer, VideoPublisher,
};
use reelforge::queue::{QueueStore, SqliteQueue};
use reelforge::retry::RetryPolicy;
use reelforge_common::paths::ScratchLayout;
use reelforge_common::{ItemId, ItemStatus, ItemUpdate, QueueItem};
use tempfile::TempDir;

/// Stub for all six services, with call counters and failure switches.
#[derive(Default)]
pub struct StubStudio {
    pub script_calls: AtomicUsize,
    pub idea_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
    pub speech_calls: AtomicUsize,
    pub compose_calls: AtomicUsize,
    pub publish_calls: AtomicUsize,
    pub host_calls: AtomicUsize,

    /// Topics containing any of these fail script generation permanently.
    pub bad_topics: Mutex<Vec<String>>,
    /// Every speech call answers 503.
    pub speech_unavailable: AtomicBool,
    /// Item ids whose composition hangs.
    pub slow_compose: Mutex<HashSet<String>>,
    /// Item ids whose render tool exceeds its own time limit.
    pub tool_timeout: Mutex<HashSet<String>>,
    /// When set, composition moves the item back to pending behind the
    /// pipeline's back.
    pub steal_during_compose: Mutex<Option<Arc<dyn QueueStore>>>,
    /// Raw idea rows returned by the idea generator.
    pub idea_rows: Mutex<String>,
}

impl StubStudio {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_topics_containing(&self, needle: &str) {
        self.bad_topics.lock().unwrap().push(needle.to_string());
    }

    pub fn providers(self: &Arc<Self>) -> Providers {
        Providers {
            scripts: self.clone(),
            ideas: self.clone(),
            images: self.clone(),
            voice: self.clone(),
            composer: self.clone(),
            publisher: self.clone(),
            audio_host: None,
        }
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ProviderError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

#[async_trait]
impl ScriptGenerator for StubStudio {
    async fn generate_script(&self, item: &QueueItem) -> Result<Script, ProviderError> {
        self.script_calls.fetch_add(1, Ordering::SeqCst);
        let bad = self
            .bad_topics
            .lock()
            .unwrap()
            .iter()
            .any(|needle| item.topic.contains(needle.as_str()));
        if bad {
            return Err(ProviderError::invalid("script has no scenes"));
        }
        Ok(Script {
            title: item.topic.clone(),
            scenes: vec![
                Scene {
                    narration: "You wake before dawn.".into(),
                    image_prompt: "mud-brick house at dawn".into(),
                },
                Scene {
                    narration: "The river is already busy.".into(),
                    image_prompt: "reed boats on the Nile".into(),
                },
            ],
        })
    }
}

#[async_trait]
impl IdeaGenerator for StubStudio {
    async fn generate_ideas(&self, _count: usize) -> Result<String, ProviderError> {
        self.idea_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.idea_rows.lock().unwrap().clone())
    }
}

#[async_trait]
impl ImageGenerator for StubStudio {
    async fn generate_image(&self, prompt: &str, output: &Path) -> Result<GeneratedImage, ProviderError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        write_file(output, b"\x89PNG").await?;
        Ok(GeneratedImage {
            path: output.to_path_buf(),
            url: Some(format!("https://images.test/{}", prompt.len())),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for StubStudio {
    async fn synthesize(&self, _text: &str, output: &Path) -> Result<PathBuf, ProviderError> {
        self.speech_calls.fetch_add(1, Ordering::SeqCst);
        if self.speech_unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Status {
                status: 503,
                body: "voice service overloaded".into(),
                retry_after: None,
            });
        }
        write_file(output, b"ID3").await?;
        Ok(output.to_path_buf())
    }
}

#[async_trait]
impl VideoComposer for StubStudio {
    async fn compose(&self, job: &CompositionJob) -> Result<PathBuf, ProviderError> {
        self.compose_calls.fetch_add(1, Ordering::SeqCst);

        let slow = self.slow_compose.lock().unwrap().contains(job.item_id.as_str());
        if slow {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.tool_timeout.lock().unwrap().contains(job.item_id.as_str()) {
            return Err(ProviderError::Timeout("ffmpeg timed out after 1s".into()));
        }

        let thief = self.steal_during_compose.lock().unwrap().clone();
        if let Some(queue) = thief {
            queue
                .transition(
                    &job.item_id,
                    ItemStatus::InProgress,
                    ItemStatus::Pending,
                    ItemUpdate::default(),
                )
                .await
                .map_err(|e| ProviderError::local(e.to_string()))?;
        }

        write_file(&job.output, b"mp4").await?;
        Ok(job.output.clone())
    }
}

#[async_trait]
impl VideoPublisher for StubStudio {
    async fn publish(&self, video: &Path, item: &QueueItem) -> Result<String, ProviderError> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        if !video.exists() {
            return Err(ProviderError::local("video missing"));
        }
        Ok(format!("vid-{}", item.id))
    }
}

#[async_trait]
impl AssetHost for StubStudio {
    async fn host(&self, path: &Path, name: &str, _mime: &str) -> Result<String, ProviderError> {
        self.host_calls.fetch_add(1, Ordering::SeqCst);
        if !path.exists() {
            return Err(ProviderError::local("nothing to host"));
        }
        Ok(format!("https://audio.test/{}", name))
    }
}

/// In-memory queue, stub services and a scratch directory.
pub struct Harness {
    pub queue: Arc<dyn QueueStore>,
    pub studio: Arc<StubStudio>,
    pub ctx: PipelineContext,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let queue: Arc<dyn QueueStore> =
            Arc::new(SqliteQueue::in_memory().expect("failed to create in-memory queue"));
        let studio = StubStudio::new();

        let ctx = PipelineContext {
            queue: queue.clone(),
            providers: studio.providers(),
            scratch: ScratchLayout::new(dir.path().join("work")),
            retry: RetryPolicy::immediate(3),
            compose_timeout: Duration::from_secs(5),
            concurrency: 1,
            ideas: IdeasConfig::default(),
        };

        Self {
            queue,
            studio,
            ctx,
            dir,
        }
    }

    /// Append an item and walk it to `status` through legal transitions.
    pub async fn seed(&self, id: &str, topic: &str, status: ItemStatus) {
        let id = ItemId::new(id);
        self.queue
            .append(vec![QueueItem::new_pending(id.clone(), topic)])
            .await
            .expect("append failed");

        if status == ItemStatus::Pending {
            return;
        }
        self.queue
            .transition(&id, ItemStatus::Pending, ItemStatus::InProgress, ItemUpdate::default())
            .await
            .expect("claim failed");

        let update = match status {
            ItemStatus::Done => ItemUpdate::published(format!("old-{}", id)),
            ItemStatus::Failed => ItemUpdate::failed("GenerationError: earlier failure"),
            _ => return,
        };
        self.queue
            .transition(&id, ItemStatus::InProgress, status, update)
            .await
            .expect("transition failed");
    }

    pub async fn item(&self, id: &str) -> QueueItem {
        self.queue.get(&ItemId::new(id)).await.expect("item missing")
    }

    pub async fn count(&self, status: ItemStatus) -> usize {
        self.queue
            .counts()
            .await
            .expect("counts failed")
            .into_iter()
            .find(|(s, _)| *s == status)
            .map(|(_, n)| n)
            .unwrap_or(0)
    }
}
