//! Console and rolling-file log sinks.

use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// File name inside the log directory; rotated daily.
pub const LOG_FILE_NAME: &str = "reelforge.log";

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "reelforge=trace,reelforge_av=trace,reelforge_db=debug,reelforge_common=debug"
    } else {
        "reelforge=debug,reelforge_av=debug,reelforge_db=info"
    }
}

/// Install the global subscriber.
///
/// With a log directory, events are also written to a daily-rotated file
/// there. The returned guard flushes that file when dropped, so keep it
/// alive until the process exits.
pub fn init_logging(log_dir: Option<&Path>, verbose: bool) -> Result<Option<WorkerGuard>> {
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter(verbose).to_string());
    let env_filter = EnvFilter::try_new(&filter)
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filters_are_valid() {
        for verbose in [false, true] {
            assert!(EnvFilter::try_new(default_filter(verbose)).is_ok());
        }
        assert!(default_filter(true).contains("reelforge=trace"));
    }
}
