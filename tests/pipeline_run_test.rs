//! End-to-end runs of the pipeline against stub services.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use common::{Harness, StubStudio};
use reelforge::pipeline::{self, process_item, OutcomeStatus, RunOptions};
use reelforge::queue::QueueStore;
use reelforge::config::ComposerConfig;
use reelforge::credentials::Secret;
use reelforge::providers::CreatomateComposer;
use reelforge_common::{Error, ItemId, ItemStatus, ItemUpdate, QueueItem, Result};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn batch(size: usize) -> RunOptions {
    RunOptions {
        batch_size: size,
        ..RunOptions::default()
    }
}

#[tokio::test]
async fn test_run_publishes_pending_and_leaves_done_alone() {
    let h = Harness::new();
    h.seed("1", "POV: You are a scribe", ItemStatus::Pending).await;
    h.seed("2", "POV: You build a pyramid", ItemStatus::Done).await;

    let report = pipeline::run(&h.ctx, &batch(3)).await;

    assert!(report.fatal.is_none());
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].id, ItemId::new("1"));
    assert_eq!(report.outcomes[0].status, OutcomeStatus::Done);
    assert_eq!(report.outcomes[0].video_id.as_deref(), Some("vid-1"));
    assert_eq!(StubStudio::count(&h.studio.publish_calls), 1);

    let done = h.item("1").await;
    assert_eq!(done.status, ItemStatus::Done);
    assert_eq!(done.video_id.as_deref(), Some("vid-1"));
    assert_eq!(
        done.script.as_deref(),
        Some("You wake before dawn. The river is already busy.")
    );
    assert!(done.video_path.unwrap().ends_with("final.mp4"));

    let untouched = h.item("2").await;
    assert_eq!(untouched.status, ItemStatus::Done);
    assert_eq!(untouched.video_id.as_deref(), Some("old-2"));
}

#[tokio::test]
async fn test_batch_size_and_all() {
    let h = Harness::new();
    for n in 1..=4 {
        h.seed(&n.to_string(), &format!("POV: idea {}", n), ItemStatus::Pending)
            .await;
    }

    let report = pipeline::run(&h.ctx, &batch(2)).await;
    let ids: Vec<_> = report.outcomes.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);

    let report = pipeline::run(
        &h.ctx,
        &RunOptions {
            all: true,
            ..batch(1)
        },
    )
    .await;
    assert_eq!(report.succeeded, 2);
    assert_eq!(h.count(ItemStatus::Done).await, 4);
}

#[tokio::test]
async fn test_composition_timeout_fails_item_and_batch_continues() {
    let mut h = Harness::new();
    h.ctx.compose_timeout = Duration::from_millis(200);
    h.studio.slow_compose.lock().unwrap().insert("1".to_string());
    h.seed("1", "POV: You embalm a pharaoh", ItemStatus::Pending).await;
    h.seed("2", "POV: You paint a tomb", ItemStatus::Pending).await;

    let report = pipeline::run(&h.ctx, &batch(3)).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(
        report.outcomes[0].error.as_deref(),
        Some("CompositionError: timeout")
    );

    let failed = h.item("1").await;
    assert_eq!(failed.status, ItemStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("CompositionError: timeout"));
    assert_eq!(h.item("2").await.status, ItemStatus::Done);
}

#[tokio::test]
async fn test_render_tool_timeout_is_a_composition_timeout() {
    let h = Harness::new();
    h.studio.tool_timeout.lock().unwrap().insert("1".to_string());
    h.seed("1", "POV: You carve a sphinx", ItemStatus::Pending).await;

    let report = pipeline::run(&h.ctx, &batch(3)).await;

    assert_eq!(report.failed, 1);
    assert_eq!(
        report.outcomes[0].error.as_deref(),
        Some("CompositionError: timeout")
    );
    assert_eq!(StubStudio::count(&h.studio.compose_calls), 1);
    assert_eq!(StubStudio::count(&h.studio.publish_calls), 0);
    assert_eq!(
        h.item("1").await.error.as_deref(),
        Some("CompositionError: timeout")
    );
}

#[tokio::test]
async fn test_remote_render_receives_hosted_narration() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/renders"))
        .and(body_partial_json(json!({
            "modifications": {
                "Audio-1.source": "https://audio.test/1_scene_001.mp3",
                "Audio-2.source": "https://audio.test/1_scene_002.mp3",
                "Text-1.text": "You wake before dawn."
            }
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "id": "r1",
            "status": "succeeded",
            "url": format!("{}/files/r1.mp4", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/r1.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let mut h = Harness::new();
    h.ctx.providers.composer = Arc::new(CreatomateComposer::new(
        reqwest::Client::new(),
        Secret::new("cm-key"),
        &ComposerConfig {
            creatomate_base_url: server.uri(),
            poll_interval_secs: 0,
            ..ComposerConfig::default()
        },
    ));
    h.ctx.providers.audio_host = Some(h.studio.clone());
    h.seed("1", "POV: You are a scribe", ItemStatus::Pending).await;

    let report = pipeline::run(&h.ctx, &batch(3)).await;

    assert_eq!(report.succeeded, 1, "{:?}", report.outcomes);
    assert_eq!(StubStudio::count(&h.studio.host_calls), 2);
    assert_eq!(h.item("1").await.status, ItemStatus::Done);
}

#[tokio::test]
async fn test_rerun_does_not_republish() {
    let h = Harness::new();
    h.seed("1", "POV: You are a scribe", ItemStatus::Pending).await;

    let first = pipeline::run(&h.ctx, &batch(3)).await;
    assert_eq!(first.succeeded, 1);

    let second = pipeline::run(&h.ctx, &batch(3)).await;
    assert!(second.outcomes.is_empty());
    assert_eq!(StubStudio::count(&h.studio.publish_calls), 1);
}

#[tokio::test]
async fn test_transient_failures_are_bounded() {
    let h = Harness::new();
    h.studio.speech_unavailable.store(true, Ordering::SeqCst);
    h.seed("1", "POV: You are a scribe", ItemStatus::Pending).await;

    let report = pipeline::run(&h.ctx, &batch(1)).await;

    assert_eq!(report.failed, 1);
    // The first scene uses up all three attempts, then the item gives up.
    assert_eq!(StubStudio::count(&h.studio.speech_calls), 3);
    assert_eq!(StubStudio::count(&h.studio.compose_calls), 0);

    let item = h.item("1").await;
    assert_eq!(item.status, ItemStatus::Failed);
    assert!(item.error.unwrap().starts_with("SynthesisError: "));
}

#[tokio::test]
async fn test_failed_items_only_retried_on_request() {
    let h = Harness::new();
    h.seed("1", "POV: You are a scribe", ItemStatus::Failed).await;

    let report = pipeline::run(&h.ctx, &batch(3)).await;
    assert!(report.outcomes.is_empty());

    let report = pipeline::run(
        &h.ctx,
        &RunOptions {
            retry_failed: true,
            ..batch(3)
        },
    )
    .await;
    assert_eq!(report.succeeded, 1);

    let item = h.item("1").await;
    assert_eq!(item.status, ItemStatus::Done);
    assert_eq!(item.error, None);
}

#[tokio::test]
async fn test_status_change_before_upload_skips_publish() {
    let h = Harness::new();
    *h.studio.steal_during_compose.lock().unwrap() = Some(h.queue.clone());
    h.seed("1", "POV: You are a scribe", ItemStatus::Pending).await;

    let report = pipeline::run(&h.ctx, &batch(1)).await;

    assert_eq!(report.failed, 1);
    assert!(report.outcomes[0]
        .error
        .as_deref()
        .unwrap()
        .starts_with("PublishError: "));
    assert_eq!(StubStudio::count(&h.studio.publish_calls), 0);
    // Whoever changed the item owns it now.
    let item = h.item("1").await;
    assert_eq!(item.status, ItemStatus::Pending);
    assert_eq!(item.error, None);
}

#[tokio::test]
async fn test_claim_conflict_is_skipped() {
    let h = Harness::new();
    h.seed("1", "POV: You are a scribe", ItemStatus::Pending).await;
    let stale = h.item("1").await;
    h.queue
        .transition(
            &stale.id,
            ItemStatus::Pending,
            ItemStatus::InProgress,
            ItemUpdate::default(),
        )
        .await
        .unwrap();

    let outcome = process_item(&h.ctx, stale).await;

    assert_eq!(outcome.status, OutcomeStatus::Skipped);
    assert_eq!(StubStudio::count(&h.studio.script_calls), 0);
    assert_eq!(h.item("1").await.status, ItemStatus::InProgress);
}

#[tokio::test]
async fn test_no_item_left_in_progress() {
    let mut h = Harness::new();
    h.ctx.concurrency = 2;
    h.studio.fail_topics_containing("cursed");
    h.seed("1", "POV: You open a cursed tomb", ItemStatus::Pending).await;
    h.seed("2", "POV: You harvest wheat", ItemStatus::Pending).await;
    h.seed("3", "POV: You read a cursed scroll", ItemStatus::Pending).await;

    let report = pipeline::run(&h.ctx, &RunOptions { all: true, ..batch(1) }).await;

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 2);
    assert_eq!(h.count(ItemStatus::InProgress).await, 0);
    assert_eq!(h.count(ItemStatus::Failed).await, 2);
    assert!(h
        .item("1")
        .await
        .error
        .unwrap()
        .starts_with("GenerationError: "));
    // Report keeps queue order even with concurrent workers.
    let ids: Vec<_> = report.outcomes.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_replenish_tops_up_empty_queue() {
    let h = Harness::new();
    *h.studio.idea_rows.lock().unwrap() =
        "1\tYou carry water to the fields\t#Nile\tMorning work\tfor production\tIrrigated fields\tpending\n"
            .to_string();

    let report = pipeline::run(
        &h.ctx,
        &RunOptions {
            replenish_below: Some(1),
            ..batch(3)
        },
    )
    .await;

    assert_eq!(StubStudio::count(&h.studio.idea_calls), 1);
    assert_eq!(report.succeeded, 1);
    let item = h.item("1").await;
    assert_eq!(item.topic, "POV: You carry water to the fields");
    assert_eq!(item.status, ItemStatus::Done);
}

/// A queue whose backend is down.
struct UnreachableQueue;

#[async_trait]
impl QueueStore for UnreachableQueue {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    async fn fetch(&self, _: &[ItemStatus], _: Option<usize>) -> Result<Vec<QueueItem>> {
        Err(Error::unavailable("connection refused"))
    }

    async fn get(&self, id: &ItemId) -> Result<QueueItem> {
        Err(Error::not_found(id.to_string()))
    }

    async fn transition(&self, _: &ItemId, _: ItemStatus, _: ItemStatus, _: ItemUpdate) -> Result<QueueItem> {
        Err(Error::unavailable("connection refused"))
    }

    async fn append(&self, _: Vec<QueueItem>) -> Result<Vec<QueueItem>> {
        Err(Error::unavailable("connection refused"))
    }

    async fn counts(&self) -> Result<Vec<(ItemStatus, usize)>> {
        Err(Error::unavailable("connection refused"))
    }

    async fn max_numeric_id(&self) -> Result<Option<u64>> {
        Err(Error::unavailable("connection refused"))
    }
}

#[tokio::test]
async fn test_unreachable_queue_is_fatal() {
    let mut h = Harness::new();
    h.ctx.queue = Arc::new(UnreachableQueue);

    let report = pipeline::run(
        &h.ctx,
        &RunOptions {
            replenish_below: Some(3),
            ..batch(3)
        },
    )
    .await;

    assert_matches!(report.fatal.as_deref(), Some(msg) if msg.starts_with("QueueUnavailable: "));
    assert!(report.outcomes.is_empty());
    assert_eq!(StubStudio::count(&h.studio.script_calls), 0);
}
