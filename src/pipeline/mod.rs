//! Batch driver: select queue items and run each through the stages.

pub mod executor;
pub mod lock;
pub mod planner;
pub mod report;

pub use executor::{process_item, Phase};
pub use lock::RunLock;
pub use report::{ItemOutcome, OutcomeStatus, RunReport};

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reelforge_common::paths::ScratchLayout;

use crate::config::{ComposerBackend, Config, IdeasConfig};
use crate::credentials::Credentials;
use crate::error::RunError;
use crate::google::auth::DRIVE_SCOPE;
use crate::google::{DriveClient, RefreshTokenSource, ServiceAccountTokenSource};
use crate::http::build_client;
use crate::ideas;
use crate::providers::{
    AssetHost, CreatomateComposer, ElevenLabsSynthesizer, GeminiClient, IdeaGenerator, ImageGenerator,
    LocalComposer, PollinationsImages, ScriptGenerator, SpeechSynthesizer, VideoComposer,
    VideoPublisher, YouTubePublisher,
};
use crate::queue::QueueStore;
use crate::retry::RetryPolicy;

/// The service behind each stage.
#[derive(Clone)]
pub struct Providers {
    pub scripts: Arc<dyn ScriptGenerator>,
    pub ideas: Arc<dyn IdeaGenerator>,
    pub images: Arc<dyn ImageGenerator>,
    pub voice: Arc<dyn SpeechSynthesizer>,
    pub composer: Arc<dyn VideoComposer>,
    pub publisher: Arc<dyn VideoPublisher>,
    /// Publishes narration for composers that fetch it by URL.
    pub audio_host: Option<Arc<dyn AssetHost>>,
}

impl Providers {
    /// Build the real clients for a full run.
    pub fn from_config(config: &Config, credentials: &Credentials) -> Result<Self, RunError> {
        let api = build_client(Duration::from_secs(config.http.request_timeout_secs));
        let uploads = build_client(Duration::from_secs(config.publisher.upload_timeout_secs));

        let gemini = Arc::new(GeminiClient::new(
            api.clone(),
            credentials.gemini()?.clone(),
            &config.generator,
            &config.ideas,
        ));

        let mut audio_host: Option<Arc<dyn AssetHost>> = None;
        let composer: Arc<dyn VideoComposer> = match config.composer.backend {
            ComposerBackend::Local => Arc::new(LocalComposer::new(&config.composer, &config.tools)),
            ComposerBackend::Creatomate => {
                let drive_tokens = Arc::new(ServiceAccountTokenSource::new(
                    api.clone(),
                    credentials.service_account()?.clone(),
                    DRIVE_SCOPE,
                ));
                audio_host = Some(Arc::new(DriveClient::new(
                    api.clone(),
                    &config.composer.drive_base_url,
                    config.composer.drive_folder_id.clone(),
                    drive_tokens,
                )));
                Arc::new(CreatomateComposer::new(
                    api.clone(),
                    credentials.creatomate()?.clone(),
                    &config.composer,
                ))
            }
        };

        let tokens = Arc::new(RefreshTokenSource::new(
            api.clone(),
            config.publisher.token_url.as_str(),
            credentials.youtube()?.clone(),
        ));

        Ok(Self {
            scripts: gemini.clone(),
            ideas: gemini,
            images: Arc::new(PollinationsImages::new(api.clone(), &config.images)),
            voice: Arc::new(ElevenLabsSynthesizer::new(
                api,
                credentials.elevenlabs()?.clone(),
                &config.voice,
            )),
            composer,
            publisher: Arc::new(YouTubePublisher::new(uploads, &config.publisher, tokens)),
            audio_host,
        })
    }
}

/// Everything a run needs besides its options.
pub struct PipelineContext {
    pub queue: Arc<dyn QueueStore>,
    pub providers: Providers,
    pub scratch: ScratchLayout,
    pub retry: RetryPolicy,
    pub compose_timeout: Duration,
    pub concurrency: usize,
    pub ideas: IdeasConfig,
}

impl PipelineContext {
    pub fn new(config: &Config, queue: Arc<dyn QueueStore>, providers: Providers) -> Self {
        Self {
            queue,
            providers,
            scratch: ScratchLayout::new(&config.paths.work_dir),
            retry: RetryPolicy::from(&config.retry),
            compose_timeout: Duration::from_secs(config.composer.timeout_secs),
            concurrency: config.run.concurrency.max(1),
            ideas: config.ideas.clone(),
        }
    }
}

/// Options for one `run` invocation.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Ignore the batch size and process every eligible item.
    pub all: bool,
    pub limit: Option<usize>,
    pub retry_failed: bool,
    pub batch_size: usize,
    /// Generate ideas first when fewer items than this are pending.
    pub replenish_below: Option<usize>,
}

/// Run a batch and return its report.
///
/// Item failures are recorded in the report; a queue that cannot be read
/// sets [`RunReport::fatal`] and no item is touched.
pub async fn run(ctx: &PipelineContext, options: &RunOptions) -> RunReport {
    let mut report = RunReport::new();
    tracing::info!(run_id = %report.run_id, "Starting run");

    if let Some(threshold) = options.replenish_below {
        if let Err(e) = ideas::replenish(
            ctx.providers.ideas.as_ref(),
            ctx.queue.as_ref(),
            threshold,
            ctx.ideas.count,
            &ctx.ideas,
            &ctx.retry,
        )
        .await
        {
            tracing::warn!("Replenishing the queue failed, continuing: {:#}", e);
        }
    }

    let items = match planner::plan(ctx.queue.as_ref(), options).await {
        Ok(items) => items,
        Err(e) => {
            tracing::error!("{}", e);
            report.fail(e);
            report.finish();
            return report;
        }
    };
    if items.is_empty() {
        tracing::info!("Nothing to do");
    }

    let outcomes: Vec<ItemOutcome> = stream::iter(items)
        .map(|item| process_item(ctx, item))
        .buffered(ctx.concurrency)
        .collect()
        .await;
    for outcome in outcomes {
        report.record(outcome);
    }
    report.finish();

    tracing::info!(
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        "Run finished"
    );
    report
}
