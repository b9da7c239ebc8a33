//! Still-image slideshow assembly with ffmpeg.
//!
//! Each scene becomes a clip: one still, slowly zoomed, captioned with its
//! narration text and muxed with its narration audio. Clips share codec
//! parameters so they can be joined with the concat demuxer without
//! re-encoding.

use crate::tools::{get_tool_path, run_tool};
use crate::{Error, Result};
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Output geometry and motion for rendered clips.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Per-frame zoom increment; `0.0` renders a static frame.
    pub zoom_step: f64,
    /// Upper bound for the zoom factor.
    pub max_zoom: f64,
    /// Burned-in caption style; `None` renders no text.
    pub caption: Option<CaptionStyle>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 540,
            height: 960,
            fps: 30,
            zoom_step: 0.0015,
            max_zoom: 1.5,
            caption: None,
        }
    }
}

/// White bordered text centred near the bottom of the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionStyle {
    pub font_size: u32,
    /// ffmpeg's built-in default font when unset.
    pub font_file: Option<PathBuf>,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_size: 40,
            font_file: None,
        }
    }
}

impl CaptionStyle {
    /// Characters that fit on one line of a `width` pixel frame.
    pub fn line_chars(&self, width: u32) -> usize {
        let glyph = (self.font_size.max(1) as f64) * 0.55;
        ((width as f64 * 0.9 / glyph).floor() as usize).max(8)
    }

    /// `drawtext` filter reading its text from `text_file`.
    pub fn drawtext(&self, text_file: &Path, height: u32) -> String {
        let mut filter = format!(
            "drawtext=textfile={}:expansion=none:fontcolor=white:fontsize={}:borderw=3:bordercolor=black:line_spacing=8:x=(w-text_w)/2:y=h-text_h-{}",
            filter_path(text_file),
            self.font_size,
            height / 8
        );
        if let Some(font) = &self.font_file {
            filter.push_str(&format!(":fontfile={}", filter_path(font)));
        }
        filter
    }
}

impl RenderSettings {
    /// Build the `-vf` chain for a clip of `frames` frames.
    ///
    /// The still is letterboxed into the output frame first so zoompan works
    /// on a fixed canvas regardless of the source aspect ratio. The caption,
    /// when given, is drawn after the zoom so it stays fixed on screen.
    pub fn scene_filter(&self, frames: u64, caption_file: Option<&Path>) -> String {
        let (w, h) = (self.width, self.height);
        let fit = format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1"
        );
        let motion = if self.zoom_step <= 0.0 {
            format!("fps={}", self.fps)
        } else {
            format!(
                "zoompan=z='min(zoom+{step},{max})':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d={frames}:s={w}x{h}:fps={fps}",
                step = self.zoom_step,
                max = self.max_zoom,
                fps = self.fps,
            )
        };
        let text = match (&self.caption, caption_file) {
            (Some(style), Some(file)) => format!(",{}", style.drawtext(file, h)),
            _ => String::new(),
        };
        format!("{fit},{motion}{text},format=yuv420p")
    }

    fn frames_for(&self, duration: Duration) -> u64 {
        ((duration.as_secs_f64() * self.fps as f64).ceil() as u64).max(1)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Handle on the ffmpeg/ffprobe binaries with a per-invocation time limit.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    limit: Duration,
}

impl Ffmpeg {
    /// Resolve both binaries, preferring configured paths over `PATH`.
    pub fn locate(
        ffmpeg_path: Option<&Path>,
        ffprobe_path: Option<&Path>,
        limit: Duration,
    ) -> Result<Self> {
        Ok(Self {
            ffmpeg: get_tool_path("ffmpeg", ffmpeg_path)?,
            ffprobe: get_tool_path("ffprobe", ffprobe_path)?,
            limit,
        })
    }

    /// Duration of a media file as reported by ffprobe.
    pub async fn probe_duration(&self, path: &Path) -> Result<Duration> {
        if !path.exists() {
            return Err(Error::missing_input(path));
        }
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "json".to_string(),
            path.display().to_string(),
        ];
        let stdout = run_tool("ffprobe", &self.ffprobe, &args, self.limit).await?;
        parse_duration(&stdout, path)
    }

    /// Render one scene clip from a still, optional narration audio and
    /// optional caption text.
    ///
    /// Without audio a silent track is generated so every clip has the same
    /// stream layout. The wrapped caption is written next to `output` as a
    /// `.txt` file for drawtext to read.
    pub async fn render_scene(
        &self,
        image: &Path,
        audio: Option<&Path>,
        caption: Option<&str>,
        duration: Duration,
        settings: &RenderSettings,
        output: &Path,
    ) -> Result<()> {
        if !image.exists() {
            return Err(Error::missing_input(image));
        }
        if duration.is_zero() {
            return Err(Error::InvalidScene("duration must be positive".into()));
        }

        let caption_file = match (&settings.caption, caption.map(str::trim)) {
            (Some(style), Some(text)) if !text.is_empty() => {
                let file = output.with_extension("txt");
                let wrapped = wrap_caption(text, style.line_chars(settings.width));
                tokio::fs::write(&file, wrapped).await?;
                Some(file)
            }
            _ => None,
        };

        let frames = settings.frames_for(duration);
        let mut args: Vec<String> = vec!["-y".into(), "-i".into(), image.display().to_string()];
        match audio {
            Some(audio) => {
                args.push("-i".into());
                args.push(audio.display().to_string());
            }
            None => {
                args.extend(["-f", "lavfi", "-i", "anullsrc=r=44100:cl=stereo"].map(String::from));
            }
        }
        let filter = settings.scene_filter(frames, caption_file.as_deref());
        let length = format!("{:.3}", duration.as_secs_f64());
        args.extend(
            [
                "-map", "0:v", "-map", "1:a",
                "-vf", filter.as_str(),
                "-c:v", "libx264", "-preset", "medium", "-profile:v", "high", "-crf", "23",
                "-pix_fmt", "yuv420p",
                "-c:a", "aac", "-b:a", "192k", "-ar", "44100", "-ac", "2",
                "-t", length.as_str(),
                "-movflags", "+faststart",
            ]
            .map(String::from),
        );
        args.push(output.display().to_string());

        run_tool("ffmpeg", &self.ffmpeg, &args, self.limit).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(output = %output.display(), frames, "Rendered scene clip");

        Ok(())
    }

    /// Join clips in order into `output` using the concat demuxer.
    pub async fn concat(&self, clips: &[PathBuf], output: &Path) -> Result<()> {
        if clips.is_empty() {
            return Err(Error::InvalidScene("no clips to concatenate".into()));
        }
        let dir = output.parent().unwrap_or_else(|| Path::new("."));
        let mut list = tempfile::Builder::new()
            .prefix("concat-")
            .suffix(".txt")
            .tempfile_in(dir)?;
        list.write_all(concat_list(clips)?.as_bytes())?;
        list.flush()?;

        let args: Vec<String> = [
            "-y", "-f", "concat", "-safe", "0", "-i",
        ]
        .iter()
        .map(|s| s.to_string())
        .chain([list.path().display().to_string()])
        .chain(["-c", "copy", "-movflags", "+faststart"].map(String::from))
        .chain([output.display().to_string()])
        .collect();

        run_tool("ffmpeg", &self.ffmpeg, &args, self.limit).await?;

        #[cfg(feature = "tracing")]
        tracing::info!(clips = clips.len(), output = %output.display(), "Concatenated clips");

        Ok(())
    }
}

/// Greedy word wrap to lines of at most `max_chars` characters.
///
/// A single word longer than the limit gets a line of its own.
pub fn wrap_caption(text: &str, max_chars: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let needed = line.chars().count() + 1 + word.chars().count();
        if !line.is_empty() && needed > max_chars {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines.join("\n")
}

/// A path as a single-quoted filter option value.
fn filter_path(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', "'\\''"))
}

fn parse_duration(stdout: &[u8], path: &Path) -> Result<Duration> {
    let parsed: ProbeOutput = serde_json::from_slice(stdout)?;
    let secs = parsed
        .format
        .duration
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| Error::probe(path, "missing or invalid duration"))?;
    Ok(Duration::from_secs_f64(secs))
}

/// Concat demuxer list with absolute, single-quote-escaped paths.
fn concat_list(clips: &[PathBuf]) -> Result<String> {
    let mut out = String::new();
    for clip in clips {
        let abs = if clip.is_absolute() {
            clip.clone()
        } else {
            std::env::current_dir()?.join(clip)
        };
        let escaped = abs.display().to_string().replace('\'', "'\\''");
        out.push_str(&format!("file '{}'\n", escaped));
    }
    Ok(out)
}
