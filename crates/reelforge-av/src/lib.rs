//! # reelforge-av
//!
//! ffmpeg-driven assembly of narrated slideshow videos.
//!
//! This crate provides functionality for:
//! - Detecting ffmpeg and ffprobe
//! - Measuring narration length with ffprobe
//! - Rendering a zooming, captioned clip per still with its narration
//! - Joining clips with the concat demuxer
//!
//! Every subprocess runs under a time limit and is killed when it expires.
//!
//! ## Features
//!
//! - `tracing` - Emit tracing events for each tool invocation
//!
//! ## Example
//!
//! ```no_run
//! use reelforge_av::{CaptionStyle, Ffmpeg, RenderSettings};
//! use std::path::{Path, PathBuf};
//! use std::time::Duration;
//!
//! # async fn run() -> reelforge_av::Result<()> {
//! let ff = Ffmpeg::locate(None, None, Duration::from_secs(300))?;
//! let audio = Path::new("scene_001.mp3");
//! let length = ff.probe_duration(audio).await?;
//! let settings = RenderSettings {
//!     caption: Some(CaptionStyle::default()),
//!     ..RenderSettings::default()
//! };
//! ff.render_scene(
//!     Path::new("scene_001.png"),
//!     Some(audio),
//!     Some("You wake before dawn."),
//!     length,
//!     &settings,
//!     Path::new("clip_001.mp4"),
//! )
//! .await?;
//! ff.concat(&[PathBuf::from("clip_001.mp4")], Path::new("final.mp4")).await?;
//! # Ok(())
//! # }
//! ```

pub mod compose;
mod error;
pub mod tools;

pub use compose::{wrap_caption, CaptionStyle, Ffmpeg, RenderSettings};
pub use error::{Error, Result};
pub use tools::{check_tool, check_tools, require_tool, ToolInfo};
