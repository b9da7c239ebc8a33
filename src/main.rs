mod cli;

use reelforge::{
    config::{self, Config},
    credentials::{CredentialScope, Credentials},
    error::RunError,
    ideas, logging,
    pipeline::{self, planner, PipelineContext, Providers, RunLock, RunOptions, RunReport},
    providers::GeminiClient,
    queue::{self, QueueStore},
    retry::RetryPolicy,
};
use reelforge_common::{paths::ScratchLayout, ItemStatus};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::sync::Arc;
use std::time::Duration;

/// Flags of the `run` command.
struct RunArgs {
    all: bool,
    limit: Option<usize>,
    retry_failed: bool,
    keep_scratch: bool,
    replenish: bool,
    dry_run: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("reelforge {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::CheckTools => {
            logging::init_logging(None, cli.verbose)?;
            return check_tools();
        }
        _ => {}
    }

    let config = config::load_config_or_default(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("ConfigError: {:#}", e))?;
    create_dirs(&config)?;
    // Keep the guard alive so the file sink flushes on exit
    let _log_guard = logging::init_logging(Some(&config.paths.log_dir), cli.verbose)?;
    tracing::debug!("Loaded config: {:?}", config);

    let rt = tokio::runtime::Runtime::new()?;
    match cli.command {
        Commands::Run {
            all,
            limit,
            retry_failed,
            keep_scratch,
            replenish,
            dry_run,
        } => rt.block_on(run_batch(
            &config,
            RunArgs {
                all,
                limit,
                retry_failed,
                keep_scratch,
                replenish,
                dry_run,
            },
        )),
        Commands::Ideas { count } => rt.block_on(generate_ideas(&config, count)),
        Commands::Status => rt.block_on(show_status(&config)),
        Commands::ResetStale => rt.block_on(reset_stale(&config)),
        Commands::Validate => validate(&config, cli.config.as_deref()),
        Commands::Version | Commands::CheckTools => Ok(()),
    }
}

fn create_dirs(config: &Config) -> Result<()> {
    for dir in [
        &config.paths.work_dir,
        &config.paths.log_dir,
        &config.paths.credentials_dir,
    ] {
        std::fs::create_dir_all(dir)
            .map_err(|e| anyhow::anyhow!("ConfigError: cannot create {}: {}", dir.display(), e))?;
    }
    Ok(())
}

fn open_queue(config: &Config, scope: CredentialScope) -> Result<(Credentials, Arc<dyn QueueStore>), RunError> {
    let credentials = Credentials::load(config, scope)?;
    let queue = queue::open(config, &credentials)?;
    Ok((credentials, queue))
}

async fn run_batch(config: &Config, args: RunArgs) -> Result<()> {
    let options = RunOptions {
        all: args.all,
        limit: args.limit,
        retry_failed: args.retry_failed,
        batch_size: config.run.batch_size,
        replenish_below: if args.replenish {
            Some(config.run.replenish_below.unwrap_or(config.run.batch_size))
        } else {
            config.run.replenish_below
        },
    };

    if args.dry_run {
        return dry_run(config, &options).await;
    }

    let prepared = start_run(config, args.keep_scratch);
    let report = match &prepared {
        Ok((_lock, ctx)) => tokio::select! {
            report = pipeline::run(ctx, &options) => report,
            signal = shutdown_signal() => {
                tracing::warn!("Stopping on {}; items already claimed stay in progress", signal);
                failed_report(RunError::Interrupted(format!("received {}", signal)))
            }
        },
        Err(e) => {
            tracing::error!("{}", e);
            failed_report(e)
        }
    };

    match report.write_to(&config.paths.log_dir) {
        Ok(path) => tracing::info!("Run report written to {}", path.display()),
        Err(e) => tracing::error!("Failed to write run report: {}", e),
    }
    print_summary(&report);

    if let Some(fatal) = &report.fatal {
        anyhow::bail!("{}", fatal);
    }
    if config.run.fail_on_item_error && report.has_item_failures() {
        anyhow::bail!("{} item(s) failed", report.failed);
    }
    Ok(())
}

/// Take the run lock, reset scratch and build the pipeline.
fn start_run(config: &Config, keep_scratch: bool) -> Result<(RunLock, PipelineContext), RunError> {
    let lock = RunLock::acquire(&config.paths.work_dir)?;

    let scratch = ScratchLayout::new(&config.paths.work_dir);
    let scratch_error = |e: reelforge_common::Error| {
        RunError::config(format!(
            "cannot prepare scratch directory {}: {}",
            config.paths.work_dir.display(),
            e
        ))
    };
    if !keep_scratch {
        let removed = scratch.clean().map_err(scratch_error)?;
        if removed > 0 {
            tracing::info!("Removed {} scratch files from earlier runs", removed);
        }
    }
    scratch.ensure().map_err(scratch_error)?;

    Ok((lock, prepare(config)?))
}

fn failed_report(error: impl ToString) -> RunReport {
    let mut report = RunReport::new();
    report.fail(error);
    report.finish();
    report
}

/// Resolves with the signal's name on Ctrl+C or SIGTERM.
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "Ctrl+C",
        _ = terminate => "SIGTERM",
    }
}

fn prepare(config: &Config) -> Result<PipelineContext, RunError> {
    let (credentials, queue) = open_queue(config, CredentialScope::Run)?;
    let providers = Providers::from_config(config, &credentials)?;
    Ok(PipelineContext::new(config, queue, providers))
}

async fn dry_run(config: &Config, options: &RunOptions) -> Result<()> {
    let (_, queue) = open_queue(config, CredentialScope::Queue)?;
    let items = planner::plan(queue.as_ref(), options).await?;

    println!("[DRY RUN] Would process {} item(s):", items.len());
    for item in &items {
        println!("  {} [{}] {}", item.id, item.status, item.topic);
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!(
        "Run {}: {} done, {} failed, {} skipped",
        report.run_id, report.succeeded, report.failed, report.skipped
    );
    for outcome in &report.outcomes {
        match (&outcome.video_id, &outcome.error) {
            (Some(video_id), _) => println!("  ✓ {} -> {}", outcome.id, video_id),
            (None, Some(error)) => println!("  ✗ {}: {}", outcome.id, error),
            (None, None) => println!("  - {}", outcome.id),
        }
    }
    if report.queue_write_errors > 0 {
        println!(
            "  {} queue write(s) failed; check the log",
            report.queue_write_errors
        );
    }
}

async fn generate_ideas(config: &Config, count: Option<usize>) -> Result<()> {
    let (credentials, queue) = open_queue(config, CredentialScope::Ideas)?;
    let client = reelforge::http::build_client(Duration::from_secs(config.http.request_timeout_secs));
    let gemini = GeminiClient::new(
        client,
        credentials.gemini()?.clone(),
        &config.generator,
        &config.ideas,
    );

    let count = count.unwrap_or(config.ideas.count);
    let items = ideas::generate_ideas(
        &gemini,
        queue.as_ref(),
        count,
        &config.ideas,
        &RetryPolicy::from(&config.retry),
    )
    .await?;

    println!("Added {} idea(s):", items.len());
    for item in &items {
        println!("  {} {}", item.id, item.topic);
    }
    Ok(())
}

async fn show_status(config: &Config) -> Result<()> {
    let (_, queue) = open_queue(config, CredentialScope::Queue)?;
    let counts = queue.counts().await.map_err(|e| RunError::queue(e.to_string()))?;

    println!("Queue ({}):", queue.name());
    if counts.is_empty() {
        println!("  empty");
    }
    for (status, count) in &counts {
        println!("  {:<12} {}", status.as_str(), count);
    }

    let next = queue
        .fetch(&[ItemStatus::Pending], Some(config.run.batch_size))
        .await
        .map_err(|e| RunError::queue(e.to_string()))?;
    if !next.is_empty() {
        println!("\nNext up:");
        for item in &next {
            println!("  {} {}", item.id, item.topic);
        }
    }
    Ok(())
}

async fn reset_stale(config: &Config) -> Result<()> {
    let _lock = RunLock::acquire(&config.paths.work_dir)?;
    let (_, queue) = open_queue(config, CredentialScope::Queue)?;
    let reset = queue
        .reset_stale()
        .await
        .map_err(|e| RunError::queue(e.to_string()))?;

    for id in &reset {
        tracing::info!(item_id = %id, "Reset to pending");
    }
    println!("Reset {} item(s) to pending", reset.len());
    Ok(())
}

fn validate(config: &Config, path: Option<&std::path::Path>) -> Result<()> {
    match path.map(|p| p.to_path_buf()).or_else(config::find_default_config) {
        Some(p) => println!("Validating config: {:?}", p),
        None => println!("No config file found, using defaults"),
    }
    println!("✓ Configuration is valid");

    Credentials::load(config, CredentialScope::Run)?;
    println!("✓ Credentials are present");

    println!("  Queue backend: {:?}", config.queue.backend);
    println!("  Composer backend: {:?}", config.composer.backend);
    println!("  Batch size: {}", config.run.batch_size);
    println!("  Concurrency: {}", config.run.concurrency);
    println!("  Work dir: {}", config.paths.work_dir.display());
    println!("  Log dir: {}", config.paths.log_dir.display());
    Ok(())
}

fn check_tools() -> Result<()> {
    println!("Checking external tools...\n");

    let tools = reelforge_av::check_tools();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Local composition needs ffmpeg and ffprobe.");
    }

    Ok(())
}
