//! Errors raised while rendering scenes and assembling the final video.

use std::path::PathBuf;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `ffmpeg` or `ffprobe` is not on `PATH` and not configured.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// Non-zero exit; `stderr` holds the tail of the tool's output.
    #[error("{tool} failed: {stderr}")]
    ToolFailed { tool: String, stderr: String },

    #[error("{tool} timed out after {}s", limit.as_secs())]
    Timeout { tool: String, limit: Duration },

    /// ffprobe ran but did not report a usable duration.
    #[error("cannot read duration of {}: {reason}", path.display())]
    Probe { path: PathBuf, reason: String },

    /// A scene image or audio file the render needs is absent.
    #[error("missing input: {}", path.display())]
    MissingInput { path: PathBuf },

    #[error("invalid scene: {0}")]
    InvalidScene(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("unreadable ffprobe output: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    pub fn tool_failed(tool: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            stderr: stderr.into(),
        }
    }

    pub fn timeout(tool: impl Into<String>, limit: Duration) -> Self {
        Self::Timeout {
            tool: tool.into(),
            limit,
        }
    }

    pub fn probe(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Probe {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_input(path: impl Into<PathBuf>) -> Self {
        Self::MissingInput { path: path.into() }
    }
}
