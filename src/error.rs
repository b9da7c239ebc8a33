//! Error taxonomy for a pipeline run.
//!
//! [`RunError`] aborts the whole run. [`ItemError`] fails a single queue item
//! and is recorded in the item's `Error` column; its display prefix names the
//! stage that failed. [`ProviderError`] is what an external service call
//! returns before the pipeline attaches a stage to it.

use std::time::Duration;

/// Fatal, run-level failure.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Missing or malformed configuration or credentials, or a held run lock.
    #[error("ConfigError: {0}")]
    Config(String),

    /// The queue backend could not be reached.
    #[error("QueueUnavailable: {0}")]
    QueueUnavailable(String),

    /// The process was asked to stop before the batch finished.
    #[error("Interrupted: {0}")]
    Interrupted(String),
}

impl RunError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn queue<S: Into<String>>(msg: S) -> Self {
        Self::QueueUnavailable(msg.into())
    }
}

/// Failure isolated to one queue item.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemError {
    #[error("GenerationError: {0}")]
    Generation(String),

    #[error("SynthesisError: {0}")]
    Synthesis(String),

    #[error("CompositionError: {0}")]
    Composition(String),

    #[error("PublishError: {0}")]
    Publish(String),
}

impl ItemError {
    /// Composition exceeded the per-item time limit.
    pub fn composition_timeout() -> Self {
        Self::Composition("timeout".to_string())
    }
}

/// Failure of a call to an external service or tool.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The service answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },

    /// The request never produced a response (timeout, connection reset).
    #[error("request failed: {0}")]
    Transport(String),

    /// The service answered but the payload was unusable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A local tool or filesystem step failed.
    #[error("{0}")]
    Local(String),

    /// A local tool ran past its time limit.
    #[error("{0}")]
    Timeout(String),
}

impl ProviderError {
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn local<S: Into<String>>(msg: S) -> Self {
        Self::Local(msg.into())
    }

    /// Rate limiting, server errors and transport failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Transport(_) => true,
            Self::InvalidResponse(_) | Self::Local(_) | Self::Timeout(_) => false,
        }
    }

    /// Server-requested wait before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::Status {
                status: status.as_u16(),
                body: err.to_string(),
                retry_after: None,
            };
        }
        if err.is_decode() {
            return Self::InvalidResponse(err.to_string());
        }
        Self::Transport(err.to_string())
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        Self::Local(err.to_string())
    }
}

impl From<reelforge_av::Error> for ProviderError {
    fn from(err: reelforge_av::Error) -> Self {
        match err {
            reelforge_av::Error::Timeout { .. } => Self::Timeout(err.to_string()),
            other => Self::Local(other.to_string()),
        }
    }
}
