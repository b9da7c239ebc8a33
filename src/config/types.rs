use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub ideas: IdeasConfig,

    #[serde(default)]
    pub images: ImagesConfig,

    #[serde(default)]
    pub voice: VoiceConfig,

    #[serde(default)]
    pub composer: ComposerConfig,

    #[serde(default)]
    pub publisher: PublisherConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Scratch root holding `images/`, `audio/` and `videos/`.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Log file and run reports.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Directory that may hold a `.env` with credentials.
    #[serde(default = "default_credentials_dir")]
    pub credentials_dir: PathBuf,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./temp")
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}
fn default_credentials_dir() -> PathBuf {
    PathBuf::from("./credentials")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            log_dir: default_log_dir(),
            credentials_dir: default_credentials_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Items per run unless `--all` or `--limit` is given (default: 3)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Items processed in parallel (default: 1, sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Exit non-zero when any item fails
    #[serde(default)]
    pub fail_on_item_error: bool,

    /// Generate new ideas first when fewer pending items than this exist
    #[serde(default)]
    pub replenish_below: Option<usize>,
}

fn default_batch_size() -> usize {
    3
}
fn default_concurrency() -> usize {
    1
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            fail_on_item_error: false,
            replenish_below: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Attempts per provider call, including the first (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_base_delay_ms() -> u64 {
    3_000
}
fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    #[default]
    Sheets,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: QueueBackend,

    /// Worksheet holding the queue (default: "youtube")
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,

    #[serde(default = "default_sheets_base_url")]
    pub sheets_base_url: String,

    /// SQLite file for the `sqlite` backend
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_sheet_name() -> String {
    "youtube".to_string()
}
fn default_sheets_base_url() -> String {
    "https://sheets.googleapis.com".to_string()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./reelforge.db")
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::default(),
            sheet_name: default_sheet_name(),
            sheets_base_url: default_sheets_base_url(),
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    #[serde(default = "default_scenes_per_video")]
    pub scenes_per_video: usize,

    /// Setting every script and idea is placed in
    #[serde(default = "default_theme")]
    pub theme: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Replaces the built-in script prompt. Placeholders: `{topic}`,
    /// `{environment}`, `{scene_count}`, `{theme}`.
    #[serde(default)]
    pub prompt_template: Option<String>,
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_scenes_per_video() -> usize {
    5
}
fn default_theme() -> String {
    "Ancient Egyptian".to_string()
}
fn default_temperature() -> f32 {
    0.9
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
            scenes_per_video: default_scenes_per_video(),
            theme: default_theme(),
            temperature: default_temperature(),
            prompt_template: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdeasConfig {
    /// Ideas requested by `ideas` and replenishment (default: 5)
    #[serde(default = "default_idea_count")]
    pub count: usize,

    #[serde(default = "default_hashtags")]
    pub default_hashtags: String,

    #[serde(default = "default_caption")]
    pub default_caption: String,

    #[serde(default = "default_environment")]
    pub default_environment: String,
}

fn default_idea_count() -> usize {
    5
}
fn default_hashtags() -> String {
    "#POV #AncientEgypt #History".to_string()
}
fn default_caption() -> String {
    "Experience ancient Egypt".to_string()
}
fn default_environment() -> String {
    "Ancient Egyptian setting".to_string()
}

impl Default for IdeasConfig {
    fn default() -> Self {
        Self {
            count: default_idea_count(),
            default_hashtags: default_hashtags(),
            default_caption: default_caption(),
            default_environment: default_environment(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImagesConfig {
    #[serde(default = "default_pollinations_base_url")]
    pub base_url: String,

    #[serde(default = "default_image_width")]
    pub width: u32,

    #[serde(default = "default_image_height")]
    pub height: u32,

    #[serde(default = "default_image_model")]
    pub model: String,

    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

fn default_pollinations_base_url() -> String {
    "https://image.pollinations.ai".to_string()
}
fn default_image_width() -> u32 {
    540
}
fn default_image_height() -> u32 {
    960
}
fn default_image_model() -> String {
    "flux".to_string()
}
fn default_seed() -> u64 {
    42
}
fn default_requests_per_minute() -> u32 {
    20
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            base_url: default_pollinations_base_url(),
            width: default_image_width(),
            height: default_image_height(),
            model: default_image_model(),
            seed: default_seed(),
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VoiceConfig {
    #[serde(default = "default_elevenlabs_base_url")]
    pub base_url: String,

    #[serde(default = "default_voice_id")]
    pub voice_id: String,

    #[serde(default = "default_voice_model")]
    pub model_id: String,
}

fn default_elevenlabs_base_url() -> String {
    "https://api.elevenlabs.io".to_string()
}
fn default_voice_id() -> String {
    "21m00Tcm4TlvDq8ikWAM".to_string()
}
fn default_voice_model() -> String {
    "eleven_multilingual_v2".to_string()
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_elevenlabs_base_url(),
            voice_id: default_voice_id(),
            model_id: default_voice_model(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComposerBackend {
    #[default]
    Local,
    Creatomate,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ComposerConfig {
    #[serde(default)]
    pub backend: ComposerBackend,

    #[serde(default = "default_image_width")]
    pub width: u32,

    #[serde(default = "default_image_height")]
    pub height: u32,

    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Clip length when the narration duration cannot be measured
    #[serde(default = "default_scene_seconds")]
    pub scene_seconds: f64,

    /// Per-frame zoom increment; 0 disables the zoom
    #[serde(default = "default_zoom_step")]
    pub zoom_step: f64,

    /// Whole-composition limit per item
    #[serde(default = "default_compose_timeout")]
    pub timeout_secs: u64,

    /// Limit for a single ffmpeg/ffprobe invocation
    #[serde(default = "default_ffmpeg_timeout")]
    pub ffmpeg_timeout_secs: u64,

    #[serde(default = "default_creatomate_base_url")]
    pub creatomate_base_url: String,

    #[serde(default = "default_template_id")]
    pub template_id: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Burn each scene's narration into its clip (local backend)
    #[serde(default = "default_captions")]
    pub captions: bool,

    #[serde(default = "default_caption_font_size")]
    pub caption_font_size: u32,

    /// TrueType font for captions; ffmpeg's default font when unset
    #[serde(default)]
    pub font_file: Option<PathBuf>,

    /// Where narration is uploaded so Creatomate can fetch it
    #[serde(default = "default_drive_base_url")]
    pub drive_base_url: String,

    #[serde(default)]
    pub drive_folder_id: Option<String>,
}

fn default_fps() -> u32 {
    30
}
fn default_scene_seconds() -> f64 {
    5.0
}
fn default_zoom_step() -> f64 {
    0.0015
}
fn default_compose_timeout() -> u64 {
    900
}
fn default_ffmpeg_timeout() -> u64 {
    300
}
fn default_creatomate_base_url() -> String {
    "https://api.creatomate.com".to_string()
}
fn default_template_id() -> String {
    "7ce095d3-6364-40b8-8031-a20d17158584".to_string()
}
fn default_poll_interval() -> u64 {
    15
}
fn default_captions() -> bool {
    true
}
fn default_caption_font_size() -> u32 {
    40
}
fn default_drive_base_url() -> String {
    "https://www.googleapis.com".to_string()
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            backend: ComposerBackend::default(),
            width: default_image_width(),
            height: default_image_height(),
            fps: default_fps(),
            scene_seconds: default_scene_seconds(),
            zoom_step: default_zoom_step(),
            timeout_secs: default_compose_timeout(),
            ffmpeg_timeout_secs: default_ffmpeg_timeout(),
            creatomate_base_url: default_creatomate_base_url(),
            template_id: default_template_id(),
            poll_interval_secs: default_poll_interval(),
            captions: default_captions(),
            caption_font_size: default_caption_font_size(),
            font_file: None,
            drive_base_url: default_drive_base_url(),
            drive_folder_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublisherConfig {
    #[serde(default = "default_upload_base_url")]
    pub upload_base_url: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// YouTube category (default: "22", People & Blogs)
    #[serde(default = "default_category_id")]
    pub category_id: String,

    #[serde(default = "default_privacy_status")]
    pub privacy_status: String,

    #[serde(default = "default_tags")]
    pub default_tags: Vec<String>,

    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,
}

fn default_upload_base_url() -> String {
    "https://www.googleapis.com".to_string()
}
fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}
fn default_category_id() -> String {
    "22".to_string()
}
fn default_privacy_status() -> String {
    "public".to_string()
}
fn default_tags() -> Vec<String> {
    ["Ancient Egypt", "POV", "History", "Experience"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_upload_timeout() -> u64 {
    600
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            upload_base_url: default_upload_base_url(),
            token_url: default_token_url(),
            category_id: default_category_id(),
            privacy_status: default_privacy_status(),
            default_tags: default_tags(),
            upload_timeout_secs: default_upload_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}
